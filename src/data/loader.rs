use crate::error::RenderError;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::source::{DataSource, Input};
use super::stdin::StdinBuffer;

pub struct DataLoader;

impl DataLoader {
    /// Produce the data object for the selected source
    pub fn load(source: &DataSource, stdin: &mut StdinBuffer) -> Result<Value, RenderError> {
        match source {
            DataSource::Legacy(value) => Self::load_legacy(value),
            DataSource::Inline(text) => {
                info!("data: inline string");
                Self::parse_json(text, "--string")
            }
            DataSource::Json(input) => {
                info!("data: JSON from {}", input);
                let text = Self::read_input(input, stdin)?;
                Self::parse_json(&text, &input.to_string())
            }
            DataSource::Yaml(input) => {
                info!("data: YAML from {}", input);
                let text = Self::read_input(input, stdin)?;
                Self::parse_yaml(&text, &input.to_string())
            }
            DataSource::Environment => {
                info!("data: environment");
                Ok(Self::environment())
            }
            DataSource::None => {
                info!("data: none");
                Ok(Value::Object(Map::new()))
            }
        }
    }

    /// Deprecated `--options`: an existing `.json` file, else a JSON literal
    fn load_legacy(value: &str) -> Result<Value, RenderError> {
        warn!("--options is deprecated; use --json <PATH> or --string <JSON>");

        let path = Path::new(value);
        if path.is_file() {
            info!("opts: \"{}\"", value);
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                return Err(RenderError::DataFileParse {
                    path: value.to_string(),
                    source: anyhow::anyhow!("\"{}\" is invalid file format.", value),
                });
            }
            let content = Self::read_file(path)?;
            return Self::parse_json(&content, value);
        }

        info!("options: {}", value);
        serde_json::from_str(value).map_err(|e| RenderError::JsonParse {
            origin: format!("--options (fail to parse options JSON: {})", value),
            source: e,
        })
    }

    fn read_input(input: &Input, stdin: &mut StdinBuffer) -> Result<String, RenderError> {
        match input {
            Input::Stdin => stdin.claim("data source"),
            Input::File(path) => Self::read_file(path),
        }
    }

    fn read_file(path: &Path) -> Result<String, RenderError> {
        fs::read_to_string(path).map_err(|e| RenderError::DataFileRead {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn parse_json(text: &str, origin: &str) -> Result<Value, RenderError> {
        serde_json::from_str(text).map_err(|e| RenderError::JsonParse {
            origin: origin.to_string(),
            source: e,
        })
    }

    /// Empty, comment-only and `null` documents become an empty mapping
    pub fn parse_yaml(text: &str, origin: &str) -> Result<Value, RenderError> {
        let is_blank = text.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
        });
        if is_blank {
            return Ok(Value::Object(Map::new()));
        }

        let value: Value = serde_yaml::from_str(text).map_err(|e| RenderError::YamlParse {
            origin: origin.to_string(),
            source: e,
        })?;

        Ok(match value {
            Value::Null => Value::Object(Map::new()),
            other => other,
        })
    }

    /// Snapshot of the process environment as a string mapping
    pub fn environment() -> Value {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| {
                Some((key.into_string().ok()?, Value::String(value.into_string().ok()?)))
            })
            .collect::<Map<String, Value>>();
        Value::Object(vars)
    }
}
