use crate::error::RenderError;
use glob::Pattern;
use path_clean::PathClean;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One template to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    File(PathBuf),
    /// The single anonymous template read from standard input
    Stdin,
}

#[derive(Debug)]
enum Exclusion {
    Substring(String),
    Pattern(Pattern),
}

pub struct TemplateResolver {
    base_dir: PathBuf,
    excludes: Vec<Exclusion>,
}

impl TemplateResolver {
    /// Exclusions containing `*`, `?` or `[` are globs; the rest are substrings
    pub fn new<P: AsRef<Path>>(base_dir: P, excludes: &[String]) -> Result<Self, RenderError> {
        let excludes = excludes
            .iter()
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                if entry.contains(['*', '?', '[']) {
                    Pattern::new(entry)
                        .map(Exclusion::Pattern)
                        .map_err(|e| RenderError::GlobPattern {
                            pattern: entry.clone(),
                            source: e,
                        })
                } else {
                    Ok(Exclusion::Substring(entry.clone()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            excludes,
        })
    }

    /// Expand `pattern` under the base directory, or fall back to stdin
    pub fn resolve(&self, pattern: Option<&str>) -> Result<Vec<TemplateRef>, RenderError> {
        let Some(pattern) = pattern else {
            return Ok(vec![TemplateRef::Stdin]);
        };

        // The base directory is a literal path; only `pattern` holds wildcards
        let base = Pattern::escape(&self.base_dir.clean().to_string_lossy());
        let joined = PathBuf::from(base).join(pattern).clean();
        let joined = joined.to_string_lossy();
        debug!("glob: \"{}\"", joined);

        let paths = glob::glob(&joined).map_err(|e| RenderError::GlobPattern {
            pattern: joined.to_string(),
            source: e,
        })?;

        let mut templates = Vec::new();
        for path in paths {
            let path = path?;
            if !path.is_file() {
                debug!("skipping non-file match \"{}\"", path.display());
                continue;
            }
            if self.is_excluded(&path) {
                debug!("excluded \"{}\"", path.display());
                continue;
            }
            templates.push(TemplateRef::File(path));
        }

        if templates.is_empty() {
            warn!("No templates matched pattern: {}", joined);
        }

        Ok(templates)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let full = path.to_string_lossy();
        let relative = path.strip_prefix(self.base_dir.clean()).unwrap_or(path);

        self.excludes.iter().any(|exclusion| match exclusion {
            Exclusion::Substring(needle) => full.contains(needle.as_str()),
            Exclusion::Pattern(pattern) => {
                pattern.matches_path(path) || pattern.matches_path(relative)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn names(base: &Path, templates: &[TemplateRef]) -> Vec<String> {
        templates
            .iter()
            .map(|t| match t {
                TemplateRef::File(p) => p
                    .strip_prefix(base)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/"),
                TemplateRef::Stdin => "<stdin>".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_no_pattern_means_stdin() {
        let resolver = TemplateResolver::new("./", &[]).unwrap();
        assert_eq!(resolver.resolve(None).unwrap(), vec![TemplateRef::Stdin]);
    }

    #[test]
    fn test_pattern_is_joined_onto_base_dir() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b.ejs");
        touch(dir.path(), "a.ejs");
        touch(dir.path(), "notes.txt");

        let resolver = TemplateResolver::new(dir.path(), &[]).unwrap();
        let templates = resolver.resolve(Some("*.ejs")).unwrap();
        assert_eq!(names(dir.path(), &templates), vec!["a.ejs", "b.ejs"]);
    }

    #[test]
    fn test_recursive_pattern_skips_directories() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "index.ejs");
        touch(dir.path(), "sub/page.ejs");
        fs::create_dir_all(dir.path().join("empty.ejs")).unwrap();

        let resolver = TemplateResolver::new(dir.path(), &[]).unwrap();
        let templates = resolver.resolve(Some("**/*.ejs")).unwrap();
        assert_eq!(
            names(dir.path(), &templates),
            vec!["index.ejs", "sub/page.ejs"]
        );
    }

    #[test]
    fn test_substring_exclusion() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "index.ejs");
        touch(dir.path(), "partials/header.ejs");
        touch(dir.path(), "_draft.ejs");

        let excludes = vec!["partials".to_string(), "_draft".to_string()];
        let resolver = TemplateResolver::new(dir.path(), &excludes).unwrap();
        let templates = resolver.resolve(Some("**/*.ejs")).unwrap();
        assert_eq!(names(dir.path(), &templates), vec!["index.ejs"]);
    }

    #[test]
    fn test_glob_exclusion_matches_relative_path() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "index.ejs");
        touch(dir.path(), "layout.partial.ejs");
        touch(dir.path(), "blog/post.ejs");

        let excludes = vec!["*.partial.ejs".to_string(), "blog/*".to_string()];
        let resolver = TemplateResolver::new(dir.path(), &excludes).unwrap();
        let templates = resolver.resolve(Some("**/*.ejs")).unwrap();
        assert_eq!(names(dir.path(), &templates), vec!["index.ejs"]);
    }

    #[test]
    fn test_empty_match_is_not_an_error() {
        let dir = tempdir().unwrap();
        let resolver = TemplateResolver::new(dir.path(), &[]).unwrap();
        assert!(resolver.resolve(Some("*.ejs")).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_patterns() {
        let dir = tempdir().unwrap();
        let resolver = TemplateResolver::new(dir.path(), &[]).unwrap();
        assert!(matches!(
            resolver.resolve(Some("***.ejs")),
            Err(RenderError::GlobPattern { .. })
        ));

        assert!(matches!(
            TemplateResolver::new(dir.path(), &["[oops".to_string()]),
            Err(RenderError::GlobPattern { .. })
        ));
    }

    #[test]
    fn test_base_dir_is_matched_literally() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "site[1]/a.ejs");
        touch(dir.path(), "site1/b.ejs");
        touch(dir.path(), "site*/c.ejs");

        let base = dir.path().join("site[1]");
        let resolver = TemplateResolver::new(&base, &[]).unwrap();
        let templates = resolver.resolve(Some("*.ejs")).unwrap();
        assert_eq!(names(&base, &templates), vec!["a.ejs"]);

        let base = dir.path().join("site*");
        let resolver = TemplateResolver::new(&base, &[]).unwrap();
        let templates = resolver.resolve(Some("*.ejs")).unwrap();
        assert_eq!(names(&base, &templates), vec!["c.ejs"]);
    }
}
