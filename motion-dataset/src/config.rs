use std::{fs::File, io::BufReader, path::Path};
use serde::{Deserialize, Serialize};
use crate::{DatasetError, DatasetResult};

/// Batching options for a [`BatchLoader`](crate::BatchLoader).
///
/// ```json
/// { "batch_size": 32, "shuffle": true, "seed": 7 }
/// ```
///
/// `shuffle` defaults to `true`. Without a `seed` the loader draws one from the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub batch_size: usize,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_shuffle() -> bool {
    true
}

impl LoaderConfig {
    pub fn new(batch_size: usize, shuffle: bool) -> Self {
        Self { batch_size, shuffle, seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_json_str(json: &str) -> DatasetResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> DatasetResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DatasetResult<()> {
        if self.batch_size == 0 {
            return Err(DatasetError::ZeroBatchSize);
        }
        Ok(())
    }
}
