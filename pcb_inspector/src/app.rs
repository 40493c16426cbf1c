use crate::config::Config;
use crate::prediction::PredictionService;
use crate::server::HttpServer;
use crate::storage::ArtifactStore;
use crate::sweeper::ArtifactSweeper;
use crate::telemetry::Metrics;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};
use yolo_detector::{config::Validatable, ClassLabels, OrtDetector};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let labels = match ClassLabels::from_file(&config.labels.get_path()) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::error!("Failed to load class labels: {:?}", e);
            return Err(Box::new(e));
        }
    };
    tracing::info!("Loaded {} class labels", labels.len());

    let detector = match OrtDetector::new(&config.model, labels) {
        Ok(detector) => Arc::new(detector),
        Err(e) => {
            tracing::error!("Failed to initialize detector: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let store = match ArtifactStore::new(&config.output) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to prepare output directory: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let prediction_service = Arc::new(PredictionService::new(detector, store.clone()));
    let metrics = Arc::new(Metrics::new()?);

    let server = HttpServer::new(prediction_service, metrics, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();
    let sweeper_shutdown_rx = shutdown_tx.subscribe();

    let sweeper_handle = ArtifactSweeper::new(store, &config.output).run(sweeper_shutdown_rx);
    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;
    let _ = sweeper_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
