use std::path::Path;

use serde::Deserialize;
use tpms_core::{Batch, CalibrationResult, MeasurementRecord};

/// On-disk batch description: a list of `[[measurement]]` tables.
#[derive(Debug, Deserialize)]
pub struct BatchFile {
    #[serde(rename = "measurement", default)]
    pub measurements: Vec<MeasurementRecord>,
}

impl BatchFile {
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            color_eyre::eyre::eyre!("failed to read batch {}: {}", path.display(), e)
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> color_eyre::Result<Self> {
        let file: BatchFile = toml::from_str(content)?;
        Ok(file)
    }

    /// Parses every frame; the first one fixes the batch's frame length.
    pub fn into_batch(self) -> CalibrationResult<Batch> {
        Batch::from_records(self.measurements)
    }
}
