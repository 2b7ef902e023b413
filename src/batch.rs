use crate::data::StdinBuffer;
use crate::error::RenderError;
use crate::output::OutputWriter;
use crate::template::{TemplateEngine, TemplateRef};
use serde_json::Value;
use tracing::{debug, info};

/// Renders each template in order and hands the result to the writer.
///
/// The first failure aborts the run, so nothing after a broken template is
/// written.
pub struct BatchRenderer<'a> {
    engine: &'a TemplateEngine,
    writer: &'a OutputWriter,
}

impl<'a> BatchRenderer<'a> {
    pub fn new(engine: &'a TemplateEngine, writer: &'a OutputWriter) -> Self {
        Self { engine, writer }
    }

    /// Returns how many templates were rendered
    pub fn run(
        &self,
        templates: &[TemplateRef],
        data: &Value,
        stdin: &mut StdinBuffer,
    ) -> Result<usize, RenderError> {
        for template in templates {
            let rendered = self.render(template, data, stdin)?;
            self.writer.write(template, &rendered)?;
        }
        info!("rendered {} template(s)", templates.len());
        Ok(templates.len())
    }

    fn render(
        &self,
        template: &TemplateRef,
        data: &Value,
        stdin: &mut StdinBuffer,
    ) -> Result<String, RenderError> {
        match template {
            TemplateRef::File(path) => {
                debug!("rendering \"{}\"", path.display());
                self.engine.render_file(path, data)
            }
            TemplateRef::Stdin => {
                debug!("rendering template from stdin");
                let source = stdin.claim("template")?;
                self.engine.render_str(&source, "<stdin>", data)
            }
        }
    }
}
