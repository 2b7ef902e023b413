mod batch;
mod cli;
mod config;
mod data;
mod error;
mod logging;
mod output;
mod template;

use batch::BatchRenderer;
use clap::Parser;
use cli::Cli;
use config::EngineConfig;
use data::{DataLoader, StdinBuffer};
use error::{RenderError, EXIT_SUCCESS};
use output::OutputWriter;
use std::path::Path;
use template::{TemplateEngine, TemplateResolver};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(&cli) {
        eprintln!("warning: {}", e);
    }

    if let Err(e) = cli.validate().and_then(|_| run(cli)) {
        eprintln!("{}", e.format_machine_readable());
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }

    std::process::exit(EXIT_SUCCESS);
}

fn run(cli: Cli) -> Result<(), RenderError> {
    let mut stdin = StdinBuffer::process();
    let base_dir = Path::new(&cli.base_dir);

    // 1. Data object, shared by every template
    let data = DataLoader::load(&cli.data_source(), &mut stdin)?;

    // 2. Engine options
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    // 3. Templates to render
    let resolver = TemplateResolver::new(base_dir, &cli.exclude_list())?;
    let templates = resolver.resolve(cli.template_pattern())?;

    // 4. Render and write, stopping at the first failure
    let engine = TemplateEngine::new(config, base_dir);
    let writer = OutputWriter::new(base_dir, cli.out.as_deref());
    BatchRenderer::new(&engine, &writer).run(&templates, &data, &mut stdin)?;

    Ok(())
}
