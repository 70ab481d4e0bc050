use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One entry in the fixed reference set of supermarkets. `Supermarket` rows
/// are not mutated by the core; this is the bootstrap/seed shape only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupermarketConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SupermarketsFile {
    pub supermarkets: Vec<SupermarketConfig>,
}

/// Load and validate the supermarkets configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_supermarkets(path: &Path) -> Result<SupermarketsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SupermarketsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let supermarkets_file: SupermarketsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::SupermarketsFileParse)?;

    validate_supermarkets(&supermarkets_file)?;

    Ok(supermarkets_file)
}

fn validate_supermarkets(file: &SupermarketsFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for supermarket in &file.supermarkets {
        if supermarket.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "supermarket name must be non-empty".to_string(),
            ));
        }

        let lower_name = supermarket.name.to_lowercase();
        if !seen_names.insert(lower_name) {
            return Err(ConfigError::Validation(format!(
                "duplicate supermarket name: '{}'",
                supermarket.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "supermarkets_test.rs"]
mod tests;
