//! # Config Loader
//!
//! Loads a `RelayBlueprint` from a `.toml` or `.json` file and validates it.
//!
//! A relative `source.path` is taken relative to the config file, so a
//! relay started from any working directory reads the same input.
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("relay.toml")).unwrap();
//! println!("Store: {}", blueprint.store.url);
//! ```

mod format;
mod validator;

pub use crate::validator::{validate, warnings};
pub use contracts::RelayBlueprint;
pub use format::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a relay config file
    ///
    /// # Errors
    /// - Missing or unsupported extension
    /// - File read failure
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RelayBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        let mut blueprint = format.parse(&content)?;
        if let Some(dir) = path.parent() {
            anchor_source_path(&mut blueprint, dir);
        }
        validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Load and validate config text. `source.path` is kept as written.
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RelayBlueprint, ContractError> {
        let blueprint = format.parse(content)?;
        validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Non-fatal configuration problems
    pub fn warnings(blueprint: &RelayBlueprint) -> Vec<String> {
        crate::validator::warnings(blueprint)
    }
}

fn anchor_source_path(blueprint: &mut RelayBlueprint, config_dir: &Path) {
    if let Some(input) = blueprint.source.path.as_mut() {
        if input.is_relative() {
            *input = config_dir.join(&*input);
        }
    }
}
