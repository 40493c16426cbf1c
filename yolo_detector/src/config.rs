use serde::Deserialize;
use std::path::PathBuf;

pub trait Validatable {
    fn get_path(&self) -> PathBuf;

    fn validate(&self) -> Result<(), String> {
        let path = self.get_path();
        if !path.exists() {
            return Err(format!("File not found: {:?}", path));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub onnx_file: String,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_min_probability")]
    pub min_probability: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
}

fn default_input_size() -> u32 {
    416
}

fn default_min_probability() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.7
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Validatable for ModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelsConfig {
    pub labels_dir: PathBuf,
    pub labels_file: String,
}

impl Validatable for LabelsConfig {
    fn get_path(&self) -> PathBuf {
        self.labels_dir.join(&self.labels_file)
    }
}
