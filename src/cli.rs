use clap::{ArgAction, Parser};
use tracing::debug;

use crate::data::{DataSource, SourceFlags};
use crate::error::RenderError;

#[derive(Parser, Debug)]
#[command(
    name = "ejs-render",
    version,
    about = "Render EJS templates against JSON, YAML, inline or environment data",
    long_about = "Renders every EJS template matched by a glob (or a single template read from \
                  standard input) against one data object, printing to stdout or writing a \
                  mirrored tree of .html files under an output directory."
)]
pub struct Cli {
    /// EJS template file path or glob, relative to the base directory.
    /// When neither this nor FILE is given, the template is read from stdin.
    #[arg(short = 'f', long = "file", value_name = "GLOB")]
    pub file: Option<String>,

    /// Template path or glob (used when --file is absent)
    #[arg(value_name = "FILE")]
    pub positional: Option<String>,

    /// Base directory the pattern is resolved against
    #[arg(short = 'b', long = "base-dir", value_name = "DIR", default_value = "./")]
    pub base_dir: String,

    /// Space-separated exclusions (substrings, or globs when they contain * ? [)
    #[arg(short = 'e', long = "exclude", value_name = "EXCL")]
    pub exclude: Option<String>,

    /// Output directory. If not specified, output goes to stdout.
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub out: Option<String>,

    /// [deprecated] Data as a JSON string or a path to a .json file
    #[arg(short = 'O', long = "options", value_name = "OPTS")]
    pub options: Option<String>,

    /// Data as an inline JSON string
    #[arg(short = 's', long = "string", value_name = "JSON")]
    pub string: Option<String>,

    /// Data from a JSON file, or '-' for stdin
    #[arg(short = 'j', long = "json", value_name = "PATH")]
    pub json: Option<String>,

    /// Data from a YAML file, or '-' for stdin
    #[arg(short = 'y', long = "yaml", value_name = "PATH")]
    pub yaml: Option<String>,

    /// Use the process environment variables as data
    #[arg(long = "env")]
    pub env: bool,

    /// JSON file of engine options (delimiter, strict, rmWhitespace, ...)
    #[arg(short = 'z', long = "config", value_name = "PATH")]
    pub config: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    /// Template glob: `--file` wins over the positional argument
    pub fn template_pattern(&self) -> Option<&str> {
        self.file.as_deref().or(self.positional.as_deref())
    }

    pub fn exclude_list(&self) -> Vec<String> {
        self.exclude
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Select the single data source honoured for this invocation
    pub fn data_source(&self) -> DataSource {
        let (source, overridden) = DataSource::resolve(SourceFlags {
            options: self.options.as_deref(),
            string: self.string.as_deref(),
            json: self.json.as_deref(),
            yaml: self.yaml.as_deref(),
            env: self.env,
        });
        for flag in overridden {
            debug!("ignoring {} because {} takes precedence", flag, source.flag());
        }
        source
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.template_pattern().is_none() && self.data_source().reads_stdin() {
            return Err(RenderError::Usage(
                "standard input cannot supply both the data ('-') and the template; \
                 pass a template with --file"
                    .to_string(),
            ));
        }

        if self.base_dir.is_empty() {
            return Err(RenderError::Usage("base-dir must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Input;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["ejs-render"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.base_dir, "./");
        assert!(cli.template_pattern().is_none());
        assert!(cli.exclude_list().is_empty());
        assert_eq!(cli.data_source(), DataSource::None);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_file_flag_wins_over_positional() {
        let cli = parse(&["-f", "*.ejs", "other.ejs"]);
        assert_eq!(cli.template_pattern(), Some("*.ejs"));

        let cli = parse(&["other.ejs"]);
        assert_eq!(cli.template_pattern(), Some("other.ejs"));
    }

    #[test]
    fn test_exclude_split_on_whitespace() {
        let cli = parse(&["-e", "partials  _draft\tvendor"]);
        assert_eq!(cli.exclude_list(), vec!["partials", "_draft", "vendor"]);
    }

    #[test]
    fn test_short_forms() {
        let cli = parse(&[
            "-b", "templates", "-o", "dist", "-z", "ejs.json", "-y", "data.yml", "a.ejs",
        ]);
        assert_eq!(cli.base_dir, "templates");
        assert_eq!(cli.out.as_deref(), Some("dist"));
        assert_eq!(cli.config.as_deref(), Some("ejs.json"));
        assert_eq!(cli.data_source(), DataSource::Yaml(Input::parse("data.yml")));
    }

    #[test]
    fn test_dash_is_accepted_as_stdin_value() {
        let cli = parse(&["--json", "-", "a.ejs"]);
        assert_eq!(cli.data_source(), DataSource::Json(Input::Stdin));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_stdin_data_without_template_is_rejected() {
        let cli = parse(&["--yaml", "-"]);
        assert!(matches!(cli.validate(), Err(RenderError::Usage(_))));
    }

    #[test]
    fn test_inline_string_beats_yaml() {
        let cli = parse(&["-s", "{}", "-y", "data.yaml", "--env"]);
        assert_eq!(cli.data_source(), DataSource::Inline("{}".to_string()));
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let result = Cli::try_parse_from(["ejs-render", "--bogus"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_second_positional_is_rejected() {
        let result = Cli::try_parse_from(["ejs-render", "a.ejs", "b.ejs"]);
        assert!(result.is_err());
    }
}
