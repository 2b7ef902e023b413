use crate::error::RenderError;
use path_clean::PathClean;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Resolves `include()` targets and guards against cycles and runaway depth
pub struct IncludeResolver {
    root_dir: PathBuf,
    max_depth: usize,
}

impl IncludeResolver {
    pub fn new<P: AsRef<Path>>(root_dir: P, max_depth: usize) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
            max_depth,
        }
    }

    /// Resolve an include name to an existing template file.
    ///
    /// Relative names are resolved against the including template's
    /// directory (the root for templates read from stdin); names starting
    /// with `/` always resolve under the root.
    pub fn resolve_path(
        &self,
        current_file: Option<&Path>,
        name: &str,
    ) -> Result<PathBuf, RenderError> {
        let joined = if let Some(absolute) = name.strip_prefix('/') {
            self.root_dir.join(absolute)
        } else {
            let current_dir = current_file
                .and_then(Path::parent)
                .unwrap_or(self.root_dir.as_path());
            current_dir.join(name)
        };

        let mut resolved = joined.clean();
        if resolved.extension().is_none() {
            resolved.set_extension("ejs");
        }

        if !resolved.is_file() {
            return Err(RenderError::IncludeNotFound {
                path: name.to_string(),
                from: current_file
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<stdin>".to_string()),
            });
        }

        Ok(resolved)
    }

    /// Push `path` onto the include stack, failing on cycles or excess depth.
    ///
    /// The stack holds the top-level template followed by one entry per
    /// nested include.
    pub fn enter(&self, stack: &mut Vec<PathBuf>, path: &Path) -> Result<(), RenderError> {
        if stack.len() > self.max_depth {
            return Err(RenderError::IncludeDepthExceeded {
                max_depth: self.max_depth,
            });
        }

        let key = Self::identity(path);
        if stack.iter().any(|entry| *entry == key) {
            return Err(RenderError::CircularInclude {
                path: path.display().to_string(),
            });
        }

        stack.push(key);
        Ok(())
    }

    /// Stable identity for cycle detection, falling back to the lexical path
    pub fn identity(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.clean())
    }

    /// Include variables seen by an included template: the parent's
    /// include variables with this include's locals laid over them key by key
    pub fn scope(parent: &Map<String, Value>, locals: Option<Value>) -> Map<String, Value> {
        let mut scope = parent.clone();
        if let Some(Value::Object(extra)) = locals {
            scope.extend(extra);
        }
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_relative_to_current_file() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        let header = dir.path().join("partials/header.ejs");
        fs::write(&header, "header").unwrap();
        let page = dir.path().join("page.ejs");

        let resolver = IncludeResolver::new(dir.path(), 20);
        let resolved = resolver
            .resolve_path(Some(&page), "partials/header")
            .unwrap();
        assert_eq!(resolved, header.clean());
    }

    #[test]
    fn test_explicit_extension_is_kept() {
        let dir = tempdir().unwrap();
        let footer = dir.path().join("footer.html");
        fs::write(&footer, "footer").unwrap();

        let resolver = IncludeResolver::new(dir.path(), 20);
        let resolved = resolver.resolve_path(None, "footer.html").unwrap();
        assert_eq!(resolved, footer.clean());
    }

    #[test]
    fn test_absolute_names_resolve_under_root() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("deep/er");
        fs::create_dir_all(&sub).unwrap();
        fs::write(dir.path().join("layout.ejs"), "layout").unwrap();

        let resolver = IncludeResolver::new(dir.path(), 20);
        let resolved = resolver
            .resolve_path(Some(&sub.join("page.ejs")), "/layout")
            .unwrap();
        assert_eq!(resolved, dir.path().join("layout.ejs").clean());
    }

    #[test]
    fn test_missing_include() {
        let dir = tempdir().unwrap();
        let page = dir.path().join("page.ejs");
        let resolver = IncludeResolver::new(dir.path(), 20);

        match resolver.resolve_path(Some(&page), "nope") {
            Err(RenderError::IncludeNotFound { path, from }) => {
                assert_eq!(path, "nope");
                assert!(from.ends_with("page.ejs"));
            }
            _ => panic!("Expected IncludeNotFound error"),
        }
    }

    #[test]
    fn test_circular_include() {
        let dir = tempdir().unwrap();
        let file_a = dir.path().join("a.ejs");
        fs::write(&file_a, "A").unwrap();

        let resolver = IncludeResolver::new(dir.path(), 20);
        let mut stack = Vec::new();
        resolver.enter(&mut stack, &file_a).unwrap();

        match resolver.enter(&mut stack, &dir.path().join("./a.ejs")) {
            Err(RenderError::CircularInclude { .. }) => {}
            _ => panic!("Expected CircularInclude error"),
        }
    }

    #[test]
    fn test_depth_limit() {
        let dir = tempdir().unwrap();
        let resolver = IncludeResolver::new(dir.path(), 2);
        let mut stack = Vec::new();

        for i in 0..3 {
            let file = dir.path().join(format!("{}.ejs", i));
            resolver.enter(&mut stack, &file).unwrap();
        }
        match resolver.enter(&mut stack, &dir.path().join("3.ejs")) {
            Err(RenderError::IncludeDepthExceeded { max_depth }) => assert_eq!(max_depth, 2),
            _ => panic!("Expected IncludeDepthExceeded error"),
        }
    }

    #[test]
    fn test_scope_overlay() {
        let parent = json!({"title": "Site", "user": {"name": "Alice"}});
        let Value::Object(parent) = parent else {
            unreachable!()
        };
        let scope = IncludeResolver::scope(&parent, Some(json!({"title": "Page"})));
        assert_eq!(
            Value::Object(scope),
            json!({"title": "Page", "user": {"name": "Alice"}})
        );

        assert!(IncludeResolver::scope(&Map::new(), None).is_empty());
        assert!(IncludeResolver::scope(&Map::new(), Some(json!([1]))).is_empty());
    }
}
