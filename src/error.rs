use std::fmt;

/// Process exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USAGE_ERROR: i32 = 2;
pub const EXIT_TEMPLATE_ERROR: i32 = 3;
pub const EXIT_DATA_ERROR: i32 = 4;
pub const EXIT_INCLUDE_ERROR: i32 = 5;
pub const EXIT_VARIABLE_ERROR: i32 = 6;
pub const EXIT_CIRCULAR_OR_DEPTH_ERROR: i32 = 7;
pub const EXIT_OUTPUT_ERROR: i32 = 8;

/// Location information for error reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Calculate location from content and byte offset
    pub fn from_offset(content: &str, offset: usize, file: &str) -> Self {
        let mut offset = offset.min(content.len());
        while !content.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &content[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count() + 1)
            .unwrap_or(1);

        Location {
            file: file.to_string(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Main error type for ejs-render
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    // Data loading errors
    #[error("Failed to read data file '{path}': {source}")]
    DataFileRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse data file '{path}': {source}")]
    DataFileParse {
        path: String,
        source: anyhow::Error,
    },

    #[error("JSON parse error in {origin}: {source}")]
    JsonParse {
        origin: String,
        source: serde_json::Error,
    },

    #[error("YAML parse error in {origin}: {source}")]
    YamlParse {
        origin: String,
        source: serde_yaml::Error,
    },

    #[error("Failed to read standard input: {0}")]
    StdinRead(std::io::Error),

    #[error("Standard input was already consumed by the {first}; it cannot also supply the {second}")]
    StdinConsumed {
        first: &'static str,
        second: &'static str,
    },

    // Engine configuration errors
    #[error("Failed to read engine config '{path}': {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse engine config '{path}': {source}")]
    ConfigParse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),

    // Template resolution errors
    #[error("Invalid glob pattern '{pattern}': {source}")]
    GlobPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Failed to read glob match: {0}")]
    GlobRead(#[from] glob::GlobError),

    // Template loading and rendering errors
    #[error("Failed to read template file '{path}': {source}")]
    TemplateFileRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Syntax error at {location}: {message}")]
    TemplateSyntax { message: String, location: Location },

    #[error("Render error at {location}: {message}")]
    TemplateRuntime { message: String, location: Location },

    // Variable errors
    #[error("Undefined variable '{name}' at {location}")]
    UndefinedVariable { name: String, location: Location },

    #[error("Cannot read properties of undefined (reading '{property}') at {location}")]
    PropertyOfUndefined { property: String, location: Location },

    // Include errors
    #[error("Include not found: '{path}' referenced from {from}")]
    IncludeNotFound { path: String, from: String },

    #[error("Circular include detected: {path}")]
    CircularInclude { path: String },

    #[error("Include depth limit exceeded (max: {max_depth})")]
    IncludeDepthExceeded { max_depth: usize },

    // Output errors
    #[error("Failed to write output '{path}': {source}")]
    OutputWrite {
        path: String,
        source: std::io::Error,
    },

    // CLI usage error
    #[error("Usage error: {0}")]
    Usage(String),
}

impl RenderError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RenderError::Usage(_)
            | RenderError::StdinConsumed { .. }
            | RenderError::ConfigRead { .. }
            | RenderError::ConfigParse { .. }
            | RenderError::InvalidConfig(_) => EXIT_USAGE_ERROR,
            RenderError::GlobPattern { .. }
            | RenderError::GlobRead(_)
            | RenderError::TemplateFileRead { .. }
            | RenderError::TemplateSyntax { .. }
            | RenderError::TemplateRuntime { .. } => EXIT_TEMPLATE_ERROR,
            RenderError::DataFileRead { .. }
            | RenderError::DataFileParse { .. }
            | RenderError::JsonParse { .. }
            | RenderError::YamlParse { .. }
            | RenderError::StdinRead(_) => EXIT_DATA_ERROR,
            RenderError::IncludeNotFound { .. } => EXIT_INCLUDE_ERROR,
            RenderError::UndefinedVariable { .. } | RenderError::PropertyOfUndefined { .. } => {
                EXIT_VARIABLE_ERROR
            }
            RenderError::CircularInclude { .. } | RenderError::IncludeDepthExceeded { .. } => {
                EXIT_CIRCULAR_OR_DEPTH_ERROR
            }
            RenderError::OutputWrite { .. } => EXIT_OUTPUT_ERROR,
        }
    }

    /// Format error for machine-readable output
    ///
    /// String fields are quoted with Rust escaping so a value never breaks
    /// the `key=value` layout
    pub fn format_machine_readable(&self) -> String {
        match self {
            RenderError::JsonParse { origin, source } => {
                format!(
                    "ERROR code=JSON_PARSE origin={:?} line={} col={}",
                    origin,
                    source.line(),
                    source.column()
                )
            }
            RenderError::YamlParse { origin, .. } => {
                format!("ERROR code=YAML_PARSE origin={:?}", origin)
            }
            RenderError::TemplateSyntax { location, .. } => {
                format!(
                    "ERROR code=TEMPLATE_SYNTAX template={:?} line={} col={}",
                    location.file, location.line, location.column
                )
            }
            RenderError::UndefinedVariable { name, location } => {
                format!(
                    "ERROR code=UNDEFINED_VAR var={:?} template={:?} line={} col={}",
                    name, location.file, location.line, location.column
                )
            }
            RenderError::PropertyOfUndefined { property, location } => {
                format!(
                    "ERROR code=UNDEFINED_PROPERTY property={:?} template={:?} line={} col={}",
                    property, location.file, location.line, location.column
                )
            }
            RenderError::IncludeNotFound { path, from } => {
                format!(
                    "ERROR code=INCLUDE_NOT_FOUND file={:?} from={:?}",
                    path, from
                )
            }
            RenderError::CircularInclude { path } => {
                format!("ERROR code=CIRCULAR_INCLUDE path={:?}", path)
            }
            RenderError::IncludeDepthExceeded { max_depth } => {
                format!("ERROR code=DEPTH_EXCEEDED max={}", max_depth)
            }
            _ => format!("ERROR: {}", self),
        }
    }
}
