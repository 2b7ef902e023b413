use crate::error::RenderError;
use crate::template::TemplateRef;
use lazy_static::lazy_static;
use path_clean::PathClean;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::info;

lazy_static! {
    static ref HAS_EXTENSION: Regex = Regex::new(r"\.\w+$").unwrap();
}

const TEMPLATE_EXTENSION: &str = ".ejs";
const DEFAULT_EXTENSION: &str = ".html";
const STDIN_OUTPUT: &str = "output.html";

/// Writes render results to stdout or to a tree mirroring the base directory
pub struct OutputWriter {
    base_dir: PathBuf,
    out_dir: Option<PathBuf>,
}

impl OutputWriter {
    pub fn new<P: AsRef<Path>>(base_dir: P, out_dir: Option<&str>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            out_dir: out_dir.map(PathBuf::from),
        }
    }

    /// Where `template` is written, or `None` in stdout mode
    pub fn destination(&self, template: &TemplateRef) -> Option<PathBuf> {
        let out_dir = self.out_dir.as_ref()?;
        let path = match template {
            TemplateRef::Stdin => return Some(out_dir.join(STDIN_OUTPUT)),
            TemplateRef::File(path) => path,
        };

        let renamed = output_name(path);
        let relative = relative_to(&renamed, &self.base_dir);
        Some(out_dir.join(relative))
    }

    pub fn write(&self, template: &TemplateRef, rendered: &str) -> Result<(), RenderError> {
        match self.destination(template) {
            None => {
                let stdout = std::io::stdout();
                Self::write_to(&mut stdout.lock(), rendered)
            }
            Some(dest) => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| RenderError::OutputWrite {
                        path: parent.display().to_string(),
                        source: e,
                    })?;
                }
                fs::write(&dest, rendered).map_err(|e| RenderError::OutputWrite {
                    path: dest.display().to_string(),
                    source: e,
                })?;
                info!("output: \"{}\"", dest.display());
                Ok(())
            }
        }
    }

    /// Write `rendered` verbatim and flush
    pub fn write_to<W: Write>(writer: &mut W, rendered: &str) -> Result<(), RenderError> {
        writer
            .write_all(rendered.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| RenderError::OutputWrite {
                path: "<stdout>".to_string(),
                source: e,
            })
    }
}

/// `page.ejs` -> `page.html`, `feed.xml.ejs` -> `feed.xml`
fn output_name(path: &Path) -> PathBuf {
    let Some(file_name) = path.file_name() else {
        return path.to_path_buf();
    };
    let file_name = file_name.to_string_lossy();
    let stem = file_name
        .strip_suffix(TEMPLATE_EXTENSION)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(&file_name);

    let mut name = stem.to_string();
    if !HAS_EXTENSION.is_match(&name) {
        name.push_str(DEFAULT_EXTENSION);
    }
    path.with_file_name(name)
}

/// Lexical relative path from `base` to `path`, using `..` when `path` lies outside
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let (path, base) = if path.is_absolute() == base.is_absolute() {
        (path.clean(), base.clean())
    } else {
        match std::env::current_dir() {
            Ok(cwd) => (cwd.join(path).clean(), cwd.join(base).clean()),
            Err(_) => return path.clean(),
        }
    };

    let path_parts: Vec<Component> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let base_parts: Vec<Component> = base
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &path_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}
