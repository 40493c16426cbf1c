use crate::{
    page::render_result,
    prediction::PredictionError,
    routes::IMAGE_FIELD,
    server::SharedState,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const ROUTE: &str = "/predict";

#[derive(Error, Debug)]
pub enum PredictImageError {
    #[error("No file uploaded!")]
    MissingInput,
    #[error("Upload could not be read: {0}")]
    Upload(#[from] MultipartError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error("Prediction task failed: {0}")]
    Internal(String),
}

impl IntoResponse for PredictImageError {
    fn into_response(self) -> Response {
        match self {
            PredictImageError::MissingInput => {
                (StatusCode::BAD_REQUEST, "No file uploaded!").into_response()
            }
            PredictImageError::Upload(err) => (err.status(), err.body_text()).into_response(),
            PredictImageError::Prediction(PredictionError::InvalidImage(err)) => {
                tracing::debug!("Rejected upload: {}", err);
                (StatusCode::BAD_REQUEST, "Invalid image file!").into_response()
            }
            PredictImageError::Prediction(PredictionError::Detector(err)) => {
                tracing::error!("Detector failed: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Detection failed.").into_response()
            }
            PredictImageError::Prediction(PredictionError::Storage(err)) => {
                tracing::error!("Failed to store annotated image: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not store the annotated image.",
                )
                    .into_response()
            }
            PredictImageError::Internal(err) => {
                tracing::error!("Prediction task failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.").into_response()
            }
        }
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, PredictImageError> {
    state.metrics.record_request(ROUTE);

    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!("Request is not a multipart upload: {}", rejection);
        PredictImageError::MissingInput
    })?;
    let image_data = read_image_field(&mut multipart).await?;

    let prediction_service = state.prediction_service.clone();
    let started = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || prediction_service.predict(&image_data))
        .await
        .map_err(|e| PredictImageError::Internal(e.to_string()))??;

    state
        .metrics
        .record_prediction_duration(started.elapsed().as_millis() as u64, ROUTE);
    state
        .metrics
        .record_detections(outcome.detections.len(), outcome.status.as_str());

    Ok(Html(render_result(&outcome)))
}

/// Reads the first file part named `image`. Plain form values do not count.
async fn read_image_field(multipart: &mut Multipart) -> Result<Bytes, PredictImageError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) && field.file_name().is_some() {
            return Ok(field.bytes().await?);
        }
    }
    Err(PredictImageError::MissingInput)
}
