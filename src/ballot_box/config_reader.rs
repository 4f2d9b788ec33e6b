use std::fs;
use std::path::{Path, PathBuf};

use election_store::StoreSettings;
use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::ballot_box::*;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BallotBoxConfig {
    #[serde(rename = "storeDirectory")]
    pub store_directory: Option<String>,
    pub slot: Option<String>,
    #[serde(rename = "prettyPrint")]
    pub pretty_print: Option<bool>,
    // Relative store directories are resolved against the config file location.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl BallotBoxConfig {
    /// The directory of the store. The command-line flag wins over the config file.
    pub fn store_directory(&self, flag: Option<&str>) -> PathBuf {
        if let Some(dir) = flag {
            return PathBuf::from(dir);
        }
        match (&self.store_directory, &self.base_dir) {
            (Some(dir), Some(base)) => base.join(dir),
            (Some(dir), None) => PathBuf::from(dir),
            (None, _) => PathBuf::from("."),
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        let mut settings = StoreSettings::default();
        if let Some(slot) = &self.slot {
            settings.slot = slot.clone();
        }
        if let Some(pretty) = self.pretty_print {
            settings.pretty_print = pretty;
        }
        settings
    }
}

pub fn read_config(path: &str) -> BallotBoxResult<BallotBoxConfig> {
    let contents = fs::read_to_string(path).context(OpeningConfigSnafu { path })?;
    let mut config: BallotBoxConfig =
        serde_json::from_str(&contents).context(ParsingConfigSnafu { path })?;
    if let Some(slot) = &config.slot {
        ensure!(
            !slot.trim().is_empty()
                && !slot.contains(|c: char| std::path::is_separator(c) || c == '.'),
            InvalidConfigSnafu {
                path,
                reason: format!("slot {:?} is not a plain name", slot),
            }
        );
    }
    config.base_dir = Path::new(path).parent().map(|p| p.to_path_buf());
    debug!("read_config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, contents: &str) -> String {
        let p = dir.join("ballotbox.json");
        fs::write(&p, contents).unwrap();
        p.display().to_string()
    }

    #[test]
    fn defaults() {
        let config = BallotBoxConfig::default();
        assert_eq!(config.store_directory(None), PathBuf::from("."));
        assert_eq!(config.store_settings(), StoreSettings::default());
    }

    #[test]
    fn full_config() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_config(
            dir.path(),
            r#"{"storeDirectory": "data", "slot": "school", "prettyPrint": true}"#,
        );
        let config = read_config(&p).unwrap();
        assert_eq!(config.store_directory(None), dir.path().join("data"));
        assert_eq!(config.store_directory(Some("/tmp/x")), PathBuf::from("/tmp/x"));
        let settings = config.store_settings();
        assert_eq!(settings.slot, "school");
        assert!(settings.pretty_print);
    }

    #[test]
    fn absolute_store_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("elsewhere");
        let p = write_config(
            dir.path(),
            &format!(r#"{{"storeDirectory": {:?}}}"#, target.display().to_string()),
        );
        let config = read_config(&p).unwrap();
        assert_eq!(config.store_directory(None), target);
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_config(dir.path(), r#"{"slots": "x"}"#);
        assert!(matches!(
            read_config(&p),
            Err(BallotBoxError::ParsingConfig { .. })
        ));
    }

    #[test]
    fn rejects_path_like_slots() {
        let dir = tempfile::tempdir().unwrap();
        for slot in ["", "../up", "a.b"] {
            let p = write_config(dir.path(), &format!(r#"{{"slot": {:?}}}"#, slot));
            assert!(matches!(
                read_config(&p),
                Err(BallotBoxError::InvalidConfig { .. })
            ));
        }
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            read_config("/nonexistent/ballotbox.json"),
            Err(BallotBoxError::OpeningConfig { .. })
        ));
    }
}
