//! Rule definitions: the declarative form read from YAML and the
//! compiled form the matcher runs.

use super::response::{ResponseTemplate, TemplateSyntaxError};
use crate::mode::Mode;
use regex::{Captures, Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;

/// Reference to a capture group, either by position or by name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GroupRef {
    Index(usize),
    Name(String),
}

impl std::fmt::Display for GroupRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupRef::Index(i) => write!(f, "{}", i),
            GroupRef::Name(n) => write!(f, "{}", n),
        }
    }
}

/// Rule as written in a template file
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub pattern: String,
    pub response: String,
    #[serde(default)]
    pub alternative: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupRef>,
    #[serde(default)]
    pub anger: u32,
    #[serde(default)]
    pub next_mode: Option<String>,
}

impl RuleSpec {
    pub fn new(pattern: &str, response: &str) -> Self {
        Self {
            id: None,
            pattern: pattern.to_string(),
            response: response.to_string(),
            alternative: None,
            groups: Vec::new(),
            anger: 0,
            next_mode: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn alternative(mut self, text: &str) -> Self {
        self.alternative = Some(text.to_string());
        self
    }

    pub fn groups(mut self, groups: Vec<GroupRef>) -> Self {
        self.groups = groups;
        self
    }

    pub fn anger(mut self, delta: u32) -> Self {
        self.anger = delta;
        self
    }

    pub fn next_mode(mut self, mode: &str) -> Self {
        self.next_mode = Some(mode.to_string());
        self
    }
}

/// A configuration problem found while compiling a rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleProblem {
    #[error("{rule}: invalid pattern: {message}")]
    InvalidPattern { rule: String, message: String },
    #[error("{rule}: group '{group}' does not exist in the pattern")]
    UnknownGroup { rule: String, group: String },
    #[error("{rule}: {field} is malformed: {source}")]
    MalformedTemplate {
        rule: String,
        field: &'static str,
        source: TemplateSyntaxError,
    },
    #[error("{rule}: {field} has {placeholders} placeholder(s) but {groups} group(s) are declared")]
    PlaceholderMismatch {
        rule: String,
        field: &'static str,
        placeholders: usize,
        groups: usize,
    },
    #[error("{rule}: unknown mode '{mode}'")]
    UnknownMode { rule: String, mode: String },
}

/// Compiled, validated rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    regex: Regex,
    response: ResponseTemplate,
    alternative: Option<ResponseTemplate>,
    groups: Vec<GroupRef>,
    pub anger_delta: u32,
    pub next_mode: Option<Mode>,
}

impl Rule {
    /// Compile a spec, reporting every problem it has.
    pub fn compile(spec: &RuleSpec, default_id: &str) -> Result<Self, Vec<RuleProblem>> {
        let id = spec.id.clone().unwrap_or_else(|| default_id.to_string());
        let mut problems = Vec::new();

        let regex = match RegexBuilder::new(&spec.pattern)
            .case_insensitive(true)
            .build()
        {
            Ok(regex) => Some(regex),
            Err(e) => {
                problems.push(RuleProblem::InvalidPattern {
                    rule: id.clone(),
                    message: e.to_string(),
                });
                None
            }
        };

        if let Some(regex) = &regex {
            for group in &spec.groups {
                let exists = match group {
                    GroupRef::Index(i) => *i < regex.captures_len(),
                    GroupRef::Name(name) => regex.capture_names().flatten().any(|n| n == name),
                };
                if !exists {
                    problems.push(RuleProblem::UnknownGroup {
                        rule: id.clone(),
                        group: group.to_string(),
                    });
                }
            }
        }

        let groups = spec.groups.len();
        let response = check_template(&id, "response", &spec.response, groups, &mut problems);
        let alternative = spec
            .alternative
            .as_deref()
            .and_then(|alt| check_template(&id, "alternative", alt, groups, &mut problems));

        let next_mode = match spec.next_mode.as_deref() {
            None => None,
            Some(name) => match Mode::from_str(name) {
                Some(mode) => Some(mode),
                None => {
                    problems.push(RuleProblem::UnknownMode {
                        rule: id.clone(),
                        mode: name.to_string(),
                    });
                    None
                }
            },
        };

        match (regex, response) {
            (Some(regex), Some(response)) if problems.is_empty() => Ok(Rule {
                id,
                regex,
                response,
                alternative,
                groups: spec.groups.clone(),
                anger_delta: spec.anger,
                next_mode,
            }),
            _ => Err(problems),
        }
    }

    /// Case-insensitive search anywhere in `text`
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.regex.captures(text)
    }

    /// Extract the declared groups in declaration order.
    /// Groups that did not take part in the match yield an empty string.
    pub fn extract(&self, caps: &Captures<'_>) -> Vec<String> {
        self.groups
            .iter()
            .map(|group| {
                let m = match group {
                    GroupRef::Index(i) => caps.get(*i),
                    GroupRef::Name(name) => caps.name(name),
                };
                m.map(|m| m.as_str().to_string()).unwrap_or_default()
            })
            .collect()
    }

    /// Template for this match: the first match uses `response`, later
    /// matches use `alternative` when there is one.
    pub fn template(&self, asked: bool) -> &ResponseTemplate {
        match (&self.alternative, asked) {
            (Some(alt), true) => alt,
            _ => &self.response,
        }
    }
}

fn check_template(
    rule: &str,
    field: &'static str,
    source: &str,
    groups: usize,
    problems: &mut Vec<RuleProblem>,
) -> Option<ResponseTemplate> {
    let template = match ResponseTemplate::parse(source) {
        Ok(t) => t,
        Err(source) => {
            problems.push(RuleProblem::MalformedTemplate {
                rule: rule.to_string(),
                field,
                source,
            });
            return None;
        }
    };

    let placeholders = template.placeholder_count();
    let out_of_range = template.max_slot().is_some_and(|max| max >= groups);
    if placeholders != groups || out_of_range {
        problems.push(RuleProblem::PlaceholderMismatch {
            rule: rule.to_string(),
            field,
            placeholders,
            groups,
        });
        return None;
    }
    Some(template)
}
