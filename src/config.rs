use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::RenderError;

/// Rendering options read from the `--config` JSON file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Character(s) between the open/close delimiters and the tag body
    pub delimiter: String,
    pub open_delimiter: String,
    pub close_delimiter: String,
    /// Undefined identifiers and property reads of undefined are errors
    pub strict: bool,
    /// Collapse newlines and strip per-line indentation before scanning
    pub rm_whitespace: bool,
    /// Directory for includes starting with `/`
    pub root: Option<PathBuf>,
    pub max_include_depth: usize,
    #[serde(flatten)]
    pub unsupported: BTreeMap<String, Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delimiter: "%".to_string(),
            open_delimiter: "<".to_string(),
            close_delimiter: ">".to_string(),
            strict: false,
            rm_whitespace: false,
            root: None,
            max_include_depth: 20,
            unsupported: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load and validate an engine config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        info!("config: \"{}\"", path_str);

        let content = fs::read_to_string(path).map_err(|e| RenderError::ConfigRead {
            path: path_str.clone(),
            source: e,
        })?;

        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| RenderError::ConfigParse {
                path: path_str,
                source: e,
            })?;

        for key in config.unsupported.keys() {
            warn!("ignoring unsupported engine option '{}'", key);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.delimiter.is_empty()
            || self.open_delimiter.is_empty()
            || self.close_delimiter.is_empty()
        {
            return Err(RenderError::InvalidConfig(
                "delimiters must not be empty".to_string(),
            ));
        }

        if self.max_include_depth == 0 {
            return Err(RenderError::InvalidConfig(
                "maxIncludeDepth must be at least 1".to_string(),
            ));
        }

        if self.max_include_depth > 1000 {
            return Err(RenderError::InvalidConfig(
                "maxIncludeDepth is too large (max: 1000)".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_empty_object_is_default() {
        let file = config_file("{}");
        assert_eq!(EngineConfig::load(file.path()).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_camel_case_keys() {
        let file = config_file(
            r#"{"strict": true, "delimiter": "?", "rmWhitespace": true, "maxIncludeDepth": 3}"#,
        );
        let config = EngineConfig::load(file.path()).unwrap();
        assert!(config.strict);
        assert!(config.rm_whitespace);
        assert_eq!(config.delimiter, "?");
        assert_eq!(config.open_delimiter, "<");
        assert_eq!(config.max_include_depth, 3);
    }

    #[test]
    fn test_unknown_keys_are_collected() {
        let file = config_file(r#"{"cache": true, "localsName": "it"}"#);
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(
            config.unsupported.keys().collect::<Vec<_>>(),
            vec!["cache", "localsName"]
        );
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        let file = config_file(r#"{"delimiter": ""}"#);
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(RenderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_include_depth_bounds() {
        let config = EngineConfig {
            max_include_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            max_include_depth: 1001,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_json() {
        let file = config_file("{strict: true}");
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(RenderError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::load("/nonexistent/ejs.json"),
            Err(RenderError::ConfigRead { .. })
        ));
    }
}
