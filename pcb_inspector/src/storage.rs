use crate::{annotate::encode_jpeg, config::OutputConfig};
use image::RgbImage;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use thiserror::Error;
use uuid::Uuid;

const ARTIFACT_EXTENSION: &str = "jpg";
const TEMP_EXTENSION: &str = "tmp";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to encode annotated image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An annotated image persisted under a per-request key.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub key: String,
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    directory: PathBuf,
    url_prefix: String,
}

impl ArtifactStore {
    pub fn new(config: &OutputConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.directory)?;
        tracing::info!("Storing annotated images in {:?}", config.directory);

        Ok(Self {
            directory: config.directory.clone(),
            url_prefix: config.get_url_prefix(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Encodes `image` as JPEG and writes it under a fresh key.
    ///
    /// The file is written to a hidden temporary name first and renamed into
    /// place, so readers never see a partially written artifact.
    pub fn save(&self, image: &RgbImage) -> Result<Artifact, StorageError> {
        let key = Uuid::new_v4().simple().to_string();
        let file_name = format!("{}.{}", key, ARTIFACT_EXTENSION);
        let path = self.directory.join(&file_name);
        let tmp_path = self.directory.join(format!(".{}.{}", key, TEMP_EXTENSION));

        let bytes = encode_jpeg(image)?;
        let written = fs::write(&tmp_path, &bytes).and_then(|()| fs::rename(&tmp_path, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        tracing::debug!("Stored artifact {} ({} bytes)", key, bytes.len());

        Ok(Artifact {
            url: format!("{}/{}", self.url_prefix, file_name),
            key,
            path,
        })
    }

    /// Deletes artifacts last modified more than `retention` ago, along with
    /// temporary files left behind by interrupted writes.
    pub fn sweep(&self, retention: Duration) -> Result<usize, StorageError> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let extension = path.extension().and_then(|ext| ext.to_str());
            if extension != Some(ARTIFACT_EXTENSION) && extension != Some(TEMP_EXTENSION) {
                continue;
            }

            let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!("Cannot read metadata of {:?}: {}", path, e);
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age <= retention {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove expired artifact {:?}: {}", path, e),
            }
        }

        Ok(removed)
    }
}
