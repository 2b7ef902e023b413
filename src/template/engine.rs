use crate::config::EngineConfig;
use crate::error::RenderError;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::ast::Node;
use super::include::IncludeResolver;
use super::lexer::Lexer;
use super::parser::Parser;
use super::render::Renderer;

/// A compiled template and the prepared source its offsets point into
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub path: Option<PathBuf>,
    pub source: String,
    pub nodes: Vec<Node>,
}

pub struct TemplateEngine {
    config: EngineConfig,
    lexer: Lexer,
    includes: IncludeResolver,
}

impl TemplateEngine {
    /// `base_dir` anchors `/`-prefixed includes unless the config sets `root`
    pub fn new(config: EngineConfig, base_dir: &Path) -> Self {
        let root = config
            .root
            .clone()
            .unwrap_or_else(|| base_dir.to_path_buf());
        Self {
            lexer: Lexer::new(&config),
            includes: IncludeResolver::new(root, config.max_include_depth),
            config,
        }
    }

    pub fn strict(&self) -> bool {
        self.config.strict
    }

    /// Compile template source
    ///
    /// Processing order:
    /// 1. Apply whitespace options to the whole source
    /// 2. Split into text and tag segments
    /// 3. Parse scriptlets and output expressions into a node tree
    pub fn compile(
        &self,
        source: &str,
        name: &str,
        path: Option<PathBuf>,
    ) -> Result<Template, RenderError> {
        let prepared = self.lexer.prepare(source);
        let segments = self.lexer.tokenize(&prepared, name)?;
        let nodes = Parser::parse(segments, &prepared, name)?;
        Ok(Template {
            name: name.to_string(),
            path,
            source: prepared,
            nodes,
        })
    }

    fn load(&self, path: &Path) -> Result<Template, RenderError> {
        let content = fs::read_to_string(path).map_err(|e| RenderError::TemplateFileRead {
            path: path.display().to_string(),
            source: e,
        })?;
        self.compile(&content, &path.display().to_string(), Some(path.to_path_buf()))
    }

    /// Render a template file with the given data
    pub fn render_file(&self, path: &Path, data: &Value) -> Result<String, RenderError> {
        let template = self.load(path)?;
        let mut stack = Vec::new();
        self.includes.enter(&mut stack, path)?;
        Renderer::new(self, &template, data, Map::new(), &mut stack).run()
    }

    /// Render template source that has no file of its own (stdin)
    pub fn render_str(&self, source: &str, name: &str, data: &Value) -> Result<String, RenderError> {
        let template = self.compile(source, name, None)?;
        let mut stack = Vec::new();
        Renderer::new(self, &template, data, Map::new(), &mut stack).run()
    }

    /// Render the target of an `include()` found in `current`
    ///
    /// `scope` holds the include variables layered over `data`
    pub(crate) fn render_include(
        &self,
        current: Option<&Path>,
        name: &str,
        data: &Value,
        scope: Map<String, Value>,
        stack: &mut Vec<PathBuf>,
    ) -> Result<String, RenderError> {
        let path = self.includes.resolve_path(current, name)?;
        self.includes.enter(stack, &path)?;
        let template = self.load(&path)?;
        let rendered = Renderer::new(self, &template, data, scope, stack).run();
        stack.pop();
        rendered
    }
}
