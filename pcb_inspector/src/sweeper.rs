use crate::{config::OutputConfig, storage::ArtifactStore};
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle, time::interval};

/// Periodically deletes artifacts older than the configured retention.
pub struct ArtifactSweeper {
    store: Arc<ArtifactStore>,
    retention: Duration,
    sweep_interval: Duration,
}

impl ArtifactSweeper {
    pub fn new(store: Arc<ArtifactStore>, output_config: &OutputConfig) -> Self {
        Self {
            store,
            retention: Duration::from_secs(output_config.retention_secs),
            sweep_interval: Duration::from_secs(output_config.sweep_interval_secs.max(1)),
        }
    }

    pub fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.sweep_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let store = self.store.clone();
                        let retention = self.retention;
                        match tokio::task::spawn_blocking(move || store.sweep(retention)).await {
                            Ok(Ok(0)) => tracing::debug!("No expired artifacts"),
                            Ok(Ok(removed)) => {
                                tracing::info!("Removed {} expired artifacts", removed)
                            }
                            Ok(Err(e)) => tracing::error!("Artifact sweep failed: {:?}", e),
                            Err(e) => tracing::error!("Artifact sweep task failed: {:?}", e),
                        }
                    },
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Artifact sweeper received shutdown signal");
                        break;
                    }
                }
            }
            tracing::info!("Artifact sweeper stopped");
        })
    }
}
