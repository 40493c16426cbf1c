use crate::{
    config::{Config, OutputConfig},
    prediction::PredictionService,
    routes::api_routes,
    telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};
use tower_http::services::ServeDir;

#[derive(Clone)]
pub struct SharedState {
    pub prediction_service: Arc<PredictionService>,
    pub metrics: Arc<Metrics>,
}

/// Routes plus the static service exposing stored artifacts under the
/// configured prefix.
pub fn create_router(
    state: SharedState,
    output: &OutputConfig,
    max_upload_bytes: usize,
) -> Router {
    let artifacts = ServeDir::new(state.prediction_service.store().directory());

    Router::new()
        .merge(api_routes())
        .nest_service(&output.get_url_prefix(), artifacts)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(
        prediction_service: Arc<PredictionService>,
        metrics: Arc<Metrics>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let metrics_layer = HttpMetricsLayerBuilder::new().build();

        let app_state = SharedState {
            prediction_service,
            metrics,
        };

        let router = create_router(
            app_state,
            &config.output,
            config.server.max_upload_bytes,
        )
        .layer(metrics_layer);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        mut shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok(())
        });

        Ok(server_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        prediction::tests::{black_jpeg, short_circuit, FailingDetector, MockDetector},
        storage::ArtifactStore,
    };
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use image::DynamicImage;
    use tower::ServiceExt;
    use yolo_detector::{Detection, Detector, DetectorError};

    const BOUNDARY: &str = "X-PCB-INSPECTOR-BOUNDARY";

    struct TestApp {
        router: Router,
        dir: tempfile::TempDir,
    }

    impl TestApp {
        fn output_dir(&self) -> std::path::PathBuf {
            self.dir.path().join("static")
        }
    }

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn input_size(&self) -> u32 {
            416
        }

        fn detect(&self, _frame: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
            panic!("inference thread crashed")
        }
    }

    fn test_app(detector: impl Detector) -> TestApp {
        test_app_with_limit(detector, 10 * 1024 * 1024)
    }

    fn test_app_with_limit(detector: impl Detector, max_upload_bytes: usize) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig {
            directory: dir.path().join("static"),
            ..OutputConfig::default()
        };
        let store = Arc::new(ArtifactStore::new(&output).unwrap());
        let state = SharedState {
            prediction_service: Arc::new(PredictionService::new(Arc::new(detector), store)),
            metrics: Arc::new(Metrics::new().unwrap()),
        };

        TestApp {
            router: create_router(state, &output, max_upload_bytes),
            dir,
        }
    }

    fn multipart_request(field_name: &str, payload: &[u8]) -> Request<Body> {
        let part_headers = format!(
            "Content-Disposition: form-data; name=\"{field_name}\"; filename=\"board.jpg\"\r\n\
             Content-Type: image/jpeg"
        );
        multipart_body(&part_headers, payload)
    }

    fn form_value_request(field_name: &str, value: &str) -> Request<Body> {
        let part_headers = format!("Content-Disposition: form-data; name=\"{field_name}\"");
        multipart_body(&part_headers, value.as_bytes())
    }

    fn multipart_body(part_headers: &str, payload: &[u8]) -> Request<Body> {
        let mut body = format!("--{BOUNDARY}\r\n{part_headers}\r\n\r\n").into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &TestApp, request: Request<Body>) -> Response {
        app.router.clone().oneshot(request).await.unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn image_src(html: &str) -> String {
        let start = html.find("<img src=\"").expect("no <img> in page") + "<img src=\"".len();
        let end = html[start..].find('"').unwrap();
        html[start..start + end].to_string()
    }

    #[tokio::test]
    async fn test_index_serves_upload_form() {
        let app = test_app(MockDetector { detections: vec![] });
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("enctype=\"multipart/form-data\""));
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(MockDetector { detections: vec![] });
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"status":"Available"}"#);
    }

    #[tokio::test]
    async fn test_missing_image_field() {
        let app = test_app(MockDetector { detections: vec![] });

        let response = send(&app, multipart_request("file", &black_jpeg(10, 10))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No file uploaded!");
    }

    #[tokio::test]
    async fn test_form_value_named_image_is_not_an_upload() {
        let app = test_app(MockDetector { detections: vec![] });

        let response = send(&app, form_value_request("image", "board.jpg")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No file uploaded!");
    }

    #[tokio::test]
    async fn test_non_multipart_body_counts_as_missing() {
        let app = test_app(MockDetector { detections: vec![] });
        let request = Request::builder()
            .method(Method::POST)
            .uri("/predict")
            .body(Body::from("image=board.jpg"))
            .unwrap();

        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No file uploaded!");
    }

    #[tokio::test]
    async fn test_invalid_image_payloads() {
        let app = test_app(MockDetector { detections: vec![] });

        for payload in [&b"not an image"[..], &[][..], &[0xFF, 0xD8, 0xFF, 0xE0][..]] {
            let response = send(&app, multipart_request("image", payload)).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_text(response).await, "Invalid image file!");
        }
    }

    #[tokio::test]
    async fn test_black_jpeg_without_detections() {
        let app = test_app(MockDetector { detections: vec![] });

        let response = send(&app, multipart_request("image", &black_jpeg(10, 10))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("No Objects Detected"));

        let src = image_src(&html);
        assert!(src.starts_with("/static/") && src.ends_with(".jpg"));

        let request = Request::builder().uri(&src).body(Body::empty()).unwrap();
        let artifact = send(&app, request).await;
        assert_eq!(artifact.status(), StatusCode::OK);
        assert_eq!(artifact.headers()[header::CONTENT_TYPE], "image/jpeg");
    }

    #[tokio::test]
    async fn test_detections_are_reported() {
        let app = test_app(MockDetector {
            detections: vec![short_circuit()],
        });

        let response = send(&app, multipart_request("image", &black_jpeg(10, 10))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<p class=\"status\">Objects Detected</p>"));
        assert!(html.contains("<li>short: 0.87</li>"));
    }

    #[tokio::test]
    async fn test_repeated_requests_keep_separate_artifacts() {
        let app = test_app(MockDetector { detections: vec![] });
        let payload = black_jpeg(10, 10);

        let first = body_text(send(&app, multipart_request("image", &payload)).await).await;
        let second = body_text(send(&app, multipart_request("image", &payload)).await).await;

        let (first_src, second_src) = (image_src(&first), image_src(&second));
        assert_ne!(first_src, second_src);

        for src in [first_src, second_src] {
            let request = Request::builder().uri(&src).body(Body::empty()).unwrap();
            assert_eq!(send(&app, request).await.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_detector_failure_is_sanitized() {
        let app = test_app(FailingDetector);

        let response = send(&app, multipart_request("image", &black_jpeg(10, 10))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Detection failed.");
    }

    #[tokio::test]
    async fn test_storage_failure_is_sanitized() {
        let app = test_app(MockDetector { detections: vec![] });
        std::fs::remove_dir_all(app.output_dir()).unwrap();

        let response = send(&app, multipart_request("image", &black_jpeg(10, 10))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_text(response).await,
            "Could not store the annotated image."
        );
    }

    #[tokio::test]
    async fn test_crashed_prediction_task_is_sanitized() {
        let app = test_app(PanickingDetector);

        let response = send(&app, multipart_request("image", &black_jpeg(10, 10))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal server error.");
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_rejected() {
        let app = test_app_with_limit(MockDetector { detections: vec![] }, 1024);

        let response = send(&app, multipart_request("image", &vec![0u8; 4096])).await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
