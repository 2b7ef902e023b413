use crate::config::EngineConfig;
use crate::error::{Location, RenderError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // rmWhitespace: collapse line breaks, then strip each line's edges
    static ref LINE_BREAKS: Regex = Regex::new(r"[\r\n]+").unwrap();
    static ref LINE_EDGES: Regex = Regex::new(r"(?m)^\s+|\s+$").unwrap();
}

/// A piece of template source between or inside tags
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    /// `<%= ... %>` (escaped) or `<%- ... %>` (raw); `offset` is where the code starts
    Output {
        code: String,
        escape: bool,
        offset: usize,
    },
    /// `<% ... %>` or `<%_ ... %>`
    Code { code: String, offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Escaped,
    Raw,
    Comment,
    Code,
}

pub struct Lexer {
    /// `<%`
    opener: String,
    /// `%>`
    closer: String,
    /// `%`
    delimiter: String,
    slurp_before: Regex,
    slurp_after: Regex,
    rm_whitespace: bool,
}

impl Lexer {
    pub fn new(config: &EngineConfig) -> Self {
        let opener = format!("{}{}", config.open_delimiter, config.delimiter);
        let closer = format!("{}{}", config.delimiter, config.close_delimiter);
        let slurp_open = format!("{}_", opener);
        let slurp_close = format!("_{}", closer);

        Self {
            slurp_before: Regex::new(&format!(r"(?m)[ \t]*{}", regex::escape(&slurp_open)))
                .unwrap(),
            slurp_after: Regex::new(&format!(r"(?m){}[ \t]*", regex::escape(&slurp_close)))
                .unwrap(),
            opener,
            closer,
            delimiter: config.delimiter.clone(),
            rm_whitespace: config.rm_whitespace,
        }
    }

    /// Apply the whitespace options that act on the whole source
    pub fn prepare(&self, source: &str) -> String {
        let mut source = source.to_string();
        if self.rm_whitespace {
            let collapsed = LINE_BREAKS.replace_all(&source, "\n");
            source = LINE_EDGES.replace_all(&collapsed, "").into_owned();
        }
        let slurp_open = format!("{}_", self.opener);
        let slurp_close = format!("_{}", self.closer);
        let source = self.slurp_before.replace_all(&source, slurp_open.as_str());
        self.slurp_after
            .replace_all(&source, slurp_close.as_str())
            .into_owned()
    }

    /// Split prepared source into text and tag segments
    pub fn tokenize(&self, source: &str, name: &str) -> Result<Vec<Segment>, RenderError> {
        let mut segments = Vec::new();
        let mut pos = 0;
        let mut trim_newline = false;

        while let Some(found) = source[pos..].find(&self.opener) {
            let start = pos + found;
            self.push_text(&mut segments, &source[pos..start], trim_newline);
            trim_newline = false;

            let after = start + self.opener.len();
            let rest = &source[after..];

            // `<%%` is a literal opener
            if rest.starts_with(&self.delimiter) {
                self.push_text(&mut segments, &self.opener, false);
                pos = after + self.delimiter.len();
                continue;
            }

            let (kind, body_start) = match rest.chars().next() {
                Some('=') => (TagKind::Escaped, after + 1),
                Some('-') => (TagKind::Raw, after + 1),
                Some('#') => (TagKind::Comment, after + 1),
                Some('_') => (TagKind::Code, after + 1),
                _ => (TagKind::Code, after),
            };

            let close_at = match source[body_start..].find(&self.closer) {
                Some(i) => body_start + i,
                None => {
                    return Err(RenderError::TemplateSyntax {
                        message: format!(
                            "Could not find matching close tag for \"{}\".",
                            self.opener
                        ),
                        location: Location::from_offset(source, start, name),
                    })
                }
            };

            let mut body_end = close_at;
            let body = &source[body_start..close_at];
            if body.ends_with('-') || body.ends_with('_') {
                body_end -= 1;
                trim_newline = true;
            }
            let code = source[body_start..body_end].to_string();

            match kind {
                TagKind::Escaped | TagKind::Raw => segments.push(Segment::Output {
                    code,
                    escape: kind == TagKind::Escaped,
                    offset: body_start,
                }),
                TagKind::Code => segments.push(Segment::Code {
                    code,
                    offset: body_start,
                }),
                TagKind::Comment => {}
            }

            pos = close_at + self.closer.len();
        }

        self.push_text(&mut segments, &source[pos..], trim_newline);
        Ok(segments)
    }

    fn push_text(&self, segments: &mut Vec<Segment>, text: &str, trim_newline: bool) {
        let text = if trim_newline {
            text.strip_prefix("\r\n")
                .or_else(|| text.strip_prefix('\n'))
                .unwrap_or(text)
        } else {
            text
        };
        if text.is_empty() {
            return;
        }

        // `%%>` outside a tag is a literal closer
        let literal_closer = format!("{}{}", self.delimiter, self.closer);
        let text = text.replace(&literal_closer, &self.closer);

        if let Some(Segment::Text(last)) = segments.last_mut() {
            last.push_str(&text);
        } else {
            segments.push(Segment::Text(text));
        }
    }
}
