//! Response templates with positional placeholders.
//!
//! `{}` takes the next captured group, `{N}` takes group `N` of the
//! rule's declared list. `{{` and `}}` produce literal braces.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateSyntaxError {
    #[error("unmatched '{{' at byte {0}")]
    UnclosedPlaceholder(usize),
    #[error("unmatched '}}' at byte {0}")]
    StrayClosingBrace(usize),
    #[error("invalid placeholder '{{{0}}}'")]
    InvalidPlaceholder(String),
    #[error("cannot mix automatic '{{}}' and numbered '{{N}}' placeholders")]
    MixedNumbering,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(usize),
}

/// A parsed response string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTemplate {
    segments: Vec<Segment>,
}

impl ResponseTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateSyntaxError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut next_auto = 0usize;
        let mut saw_auto = false;
        let mut saw_numbered = false;

        let mut chars = source.char_indices().peekable();
        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateSyntaxError::StrayClosingBrace(pos)),
                '{' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(TemplateSyntaxError::UnclosedPlaceholder(pos));
                    }

                    let slot = if inner.is_empty() {
                        saw_auto = true;
                        next_auto += 1;
                        next_auto - 1
                    } else {
                        saw_numbered = true;
                        inner
                            .parse::<usize>()
                            .map_err(|_| TemplateSyntaxError::InvalidPlaceholder(inner.clone()))?
                    };
                    if saw_auto && saw_numbered {
                        return Err(TemplateSyntaxError::MixedNumbering);
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Number of placeholders in the template
    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Slot(_)))
            .count()
    }

    /// Highest slot index referenced, if any
    pub fn max_slot(&self) -> Option<usize> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Slot(i) => Some(*i),
                Segment::Literal(_) => None,
            })
            .max()
    }

    /// Fill placeholders from `values`. Missing values render as empty.
    pub fn render<S: AsRef<str>>(&self, values: &[S]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(i) => {
                    if let Some(value) = values.get(*i) {
                        out.push_str(value.as_ref());
                    }
                }
            }
        }
        out
    }
}
