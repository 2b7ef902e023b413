use std::fmt;
use std::path::PathBuf;

/// Where a JSON or YAML payload is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    /// `-` names standard input, anything else is a file path
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            Input::Stdin
        } else {
            Input::File(PathBuf::from(value))
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Stdin => write!(f, "<stdin>"),
            Input::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The one data source honoured by an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    None,
    /// Deprecated `--options`: a `.json` file path or a JSON literal
    Legacy(String),
    Inline(String),
    Json(Input),
    Yaml(Input),
    Environment,
}

/// Raw data-source flags as given on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceFlags<'a> {
    pub options: Option<&'a str>,
    pub string: Option<&'a str>,
    pub json: Option<&'a str>,
    pub yaml: Option<&'a str>,
    pub env: bool,
}

impl DataSource {
    /// Pick the highest-precedence source among the given flags.
    ///
    /// Precedence: `--options`, `--string`, `--json`, `--yaml`, `--env`.
    /// Also returns the flags that were present but lost, in precedence order.
    pub fn resolve(flags: SourceFlags<'_>) -> (DataSource, Vec<&'static str>) {
        let candidates = [
            flags.options.map(|v| DataSource::Legacy(v.to_string())),
            flags.string.map(|v| DataSource::Inline(v.to_string())),
            flags.json.map(|v| DataSource::Json(Input::parse(v))),
            flags.yaml.map(|v| DataSource::Yaml(Input::parse(v))),
            flags.env.then_some(DataSource::Environment),
        ];

        let mut present = candidates.into_iter().flatten();
        let selected = present.next().unwrap_or(DataSource::None);
        let overridden = present.map(|source| source.flag()).collect();
        (selected, overridden)
    }

    /// Command-line flag that selects this source
    pub fn flag(&self) -> &'static str {
        match self {
            DataSource::None => "(none)",
            DataSource::Legacy(_) => "--options",
            DataSource::Inline(_) => "--string",
            DataSource::Json(_) => "--json",
            DataSource::Yaml(_) => "--yaml",
            DataSource::Environment => "--env",
        }
    }

    pub fn reads_stdin(&self) -> bool {
        matches!(
            self,
            DataSource::Json(Input::Stdin) | DataSource::Yaml(Input::Stdin)
        )
    }
}
