use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};
use thiserror::Error;

const FALLBACK_COLOR: (u8, u8, u8) = (255, 255, 255);

#[derive(Error, Debug)]
pub enum LabelsError {
    #[error("Failed to read labels file: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorLabel {
    pub label: String,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    labels: Vec<ColorLabel>,
}

impl ClassLabels {
    pub fn new(labels: Vec<ColorLabel>) -> Self {
        Self { labels }
    }

    pub fn from_file(path: &Path) -> Result<Self, LabelsError> {
        let file = File::open(path)?;
        Self::from_reader(io::BufReader::new(file))
    }

    /// Parses `label,red,green,blue` lines. Blank lines are skipped.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, LabelsError> {
        let mut labels = Vec::new();

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            labels.push(parse_line(&line, index + 1)?);
        }

        Ok(Self::new(labels))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn resolve(&self, class_id: usize) -> ColorLabel {
        match self.labels.get(class_id) {
            Some(color_label) => color_label.clone(),
            None => ColorLabel {
                label: format!("Unknown class {}", class_id),
                red: FALLBACK_COLOR.0,
                green: FALLBACK_COLOR.1,
                blue: FALLBACK_COLOR.2,
            },
        }
    }
}

fn parse_line(line: &str, line_number: usize) -> Result<ColorLabel, LabelsError> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();

    if parts.len() != 4 {
        return Err(LabelsError::InvalidLine {
            line: line_number,
            reason: format!("expected `label,red,green,blue`, got `{}`", line),
        });
    }

    let channel = |name: &str, value: &str| {
        value.parse::<u8>().map_err(|_| LabelsError::InvalidLine {
            line: line_number,
            reason: format!("invalid {} value `{}`", name, value),
        })
    };

    Ok(ColorLabel {
        label: parts[0].to_string(),
        red: channel("red", parts[1])?,
        green: channel("green", parts[2])?,
        blue: channel("blue", parts[3])?,
    })
}
