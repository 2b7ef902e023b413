pub mod ast;
pub mod engine;
pub mod include;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod resolver;
pub mod value;

pub use engine::TemplateEngine;
pub use resolver::{TemplateRef, TemplateResolver};
