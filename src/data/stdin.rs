use std::io::{self, Read};

use crate::error::RenderError;

/// Standard input, readable exactly once per invocation.
///
/// The buffer records which stage claimed it; a second claim fails instead
/// of handing back an already-drained stream.
pub struct StdinBuffer {
    reader: Option<Box<dyn Read>>,
    claimed_by: Option<&'static str>,
}

impl StdinBuffer {
    pub fn new<R: Read + 'static>(reader: R) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            claimed_by: None,
        }
    }

    /// The process's standard input
    pub fn process() -> Self {
        Self::new(io::stdin())
    }

    /// Read all of standard input on behalf of `purpose`
    pub fn claim(&mut self, purpose: &'static str) -> Result<String, RenderError> {
        if let Some(first) = self.claimed_by {
            return Err(RenderError::StdinConsumed {
                first,
                second: purpose,
            });
        }
        self.claimed_by = Some(purpose);

        let mut content = String::new();
        if let Some(mut reader) = self.reader.take() {
            reader
                .read_to_string(&mut content)
                .map_err(RenderError::StdinRead)?;
        }
        Ok(content)
    }
}
