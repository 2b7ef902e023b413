pub mod loader;
pub mod source;
pub mod stdin;

pub use loader::DataLoader;
pub use source::{DataSource, Input, SourceFlags};
pub use stdin::StdinBuffer;
