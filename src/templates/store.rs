//! Template store: every rule table, menu and phrase the bot speaks with.
//!
//! Stores are read from YAML and validated once, as a whole, before any
//! engine is created. A store that loads is safe to run: regexes compile,
//! placeholders line up with declared groups, modes resolve and the oracle
//! pools are non-empty.

use super::rule::{Rule, RuleProblem, RuleSpec};
use crate::mode::Mode;
use crate::oracle::{OracleMenu, OracleProblem, PredictionGenerator, Subject};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUILTIN_TEMPLATES: &str = include_str!("../../templates/arthur.yaml");

/// Fixed lines used around the rule tables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Phrases {
    pub greeting: String,
    pub farewell: String,
    pub default_fallback: String,
    pub fight_fallback: String,
    pub fight_entry: String,
    pub oracle_intro: String,
    pub prediction_ack: String,
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            greeting: "Hey, I'm back!".to_string(),
            farewell: "Bye then.".to_string(),
            default_fallback: "Huh?".to_string(),
            fight_fallback: "Press the buttons!".to_string(),
            fight_entry: "Go on, say something.".to_string(),
            oracle_intro: "Time for fortune telling, kids.".to_string(),
            prediction_ack: "Let's see what we have here...".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StoreFile {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    phrases: Phrases,
    #[serde(default)]
    default: Vec<RuleSpec>,
    fight: FightSection,
    oracle: OracleSection,
}

#[derive(Debug, Deserialize)]
struct FightSection {
    #[serde(default)]
    keyboard: Vec<Vec<String>>,
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
struct OracleSection {
    menu: Vec<String>,
    refusal: String,
    farewell: String,
    #[serde(default)]
    general: Vec<String>,
    #[serde(default)]
    subjects: Vec<Subject>,
}

/// One thing wrong with a template store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreProblem {
    #[error(transparent)]
    Rule(#[from] RuleProblem),
    #[error(transparent)]
    Oracle(#[from] OracleProblem),
    #[error("invalid address pattern: {0}")]
    Address(String),
    #[error("fight keyboard is empty")]
    EmptyFightKeyboard,
    #[error("fight button '{0}' matches no fight rule")]
    DeadButton(String),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read templates from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse templates: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid template store ({} problem(s)):\n{}", .problems.len(), list_problems(.problems))]
    Invalid { problems: Vec<StoreProblem> },
}

fn list_problems(problems: &[StoreProblem]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {}", p))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Oracle mode content
#[derive(Debug, Clone)]
pub struct OracleTemplates {
    pub menu: OracleMenu,
    pub refusal: String,
    pub farewell: String,
    pub predictions: PredictionGenerator,
}

/// Validated, immutable template store. Shared read-only between sessions.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    address: Option<Regex>,
    pub phrases: Phrases,
    default_rules: Vec<Rule>,
    fight_rules: Vec<Rule>,
    fight_keyboard: Vec<Vec<String>>,
    pub oracle: OracleTemplates,
}

impl TemplateStore {
    /// Store embedded in the binary
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::from_yaml(BUILTIN_TEMPLATES)
    }

    /// Load and validate a YAML template file
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, TemplateError> {
        let file: StoreFile = serde_yaml::from_str(content)?;
        Self::build(file)
    }

    fn build(file: StoreFile) -> Result<Self, TemplateError> {
        let mut problems: Vec<StoreProblem> = Vec::new();

        let address = match file.address.as_deref() {
            None => None,
            Some(pattern) => match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    problems.push(StoreProblem::Address(e.to_string()));
                    None
                }
            },
        };

        let default_rules = compile_rules(Mode::Default, &file.default, &mut problems);
        let fight_rules = compile_rules(Mode::Fight, &file.fight.rules, &mut problems);

        let fight_keyboard = file.fight.keyboard;
        if fight_keyboard.iter().all(|row| row.is_empty()) {
            problems.push(StoreProblem::EmptyFightKeyboard);
        }
        // Only meaningful when every fight rule compiled
        if fight_rules.len() == file.fight.rules.len() {
            for caption in fight_keyboard.iter().flatten() {
                if !fight_rules.iter().any(|r| r.captures(caption).is_some()) {
                    problems.push(StoreProblem::DeadButton(caption.clone()));
                }
            }
        }

        let menu = match OracleMenu::new(file.oracle.menu) {
            Ok(menu) => Some(menu),
            Err(e) => {
                problems.push(e.into());
                None
            }
        };
        let predictions = match PredictionGenerator::new(file.oracle.subjects, file.oracle.general)
        {
            Ok(generator) => Some(generator),
            Err(errors) => {
                problems.extend(errors.into_iter().map(StoreProblem::from));
                None
            }
        };

        match (menu, predictions) {
            (Some(menu), Some(predictions)) if problems.is_empty() => Ok(Self {
                address,
                phrases: file.phrases,
                default_rules,
                fight_rules,
                fight_keyboard,
                oracle: OracleTemplates {
                    menu,
                    refusal: file.oracle.refusal,
                    farewell: file.oracle.farewell,
                    predictions,
                },
            }),
            _ => Err(TemplateError::Invalid { problems }),
        }
    }

    /// Ordered rule table for a mode. Oracle mode has none.
    pub fn rules(&self, mode: Mode) -> &[Rule] {
        match mode {
            Mode::Default => &self.default_rules,
            Mode::Fight => &self.fight_rules,
            Mode::Oracle => &[],
        }
    }

    pub fn fight_keyboard(&self) -> &[Vec<String>] {
        &self.fight_keyboard
    }

    /// Keyboard shown while a mode is active
    pub fn keyboard(&self, mode: Mode) -> Option<Vec<Vec<String>>> {
        match mode {
            Mode::Default => None,
            Mode::Fight => Some(self.fight_keyboard.clone()),
            Mode::Oracle => Some(self.oracle.menu.keyboard()),
        }
    }

    /// Whether a Default-mode message is addressed to the bot
    pub fn is_addressed(&self, text: &str) -> bool {
        self.address.as_ref().map_or(true, |re| re.is_match(text))
    }

    /// One-line description for `--check`
    pub fn summary(&self) -> String {
        format!(
            "{} default rule(s), {} fight rule(s), {} fight button(s), {} possible prediction(s)",
            self.default_rules.len(),
            self.fight_rules.len(),
            self.fight_keyboard.iter().flatten().count(),
            self.oracle.predictions.space_size()
        )
    }
}

fn compile_rules(mode: Mode, specs: &[RuleSpec], problems: &mut Vec<StoreProblem>) -> Vec<Rule> {
    let mut rules = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        match Rule::compile(spec, &format!("{}[{}]", mode, index)) {
            Ok(rule) => rules.push(rule),
            Err(errors) => problems.extend(errors.into_iter().map(StoreProblem::from)),
        }
    }
    rules
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small store used by engine and session tests
    pub(crate) const TEST_STORE: &str = r#"
address: "arthur"
phrases:
  greeting: "hello"
  farewell: "bye"
  default_fallback: "what?"
  fight_fallback: "buttons!"
  fight_entry: "come on then"
  oracle_intro: "oracle time"
  prediction_ack: "hmm..."
default:
  - id: name
    pattern: 'arthur.*call me (\w+)'
    groups: [1]
    response: "Nice to meet you, {}"
    alternative: "I know, {}"
  - id: insult
    pattern: 'arthur.*(idiot|fool)'
    response: "Watch it"
    alternative: "Again?"
    anger: 3
  - id: shove
    pattern: 'arthur.*shove'
    response: "Hey!"
    anger: 6
  - id: fortune
    pattern: 'arthur.*fortune'
    response: "Let me see"
    next_mode: oracle
  - id: hello
    pattern: 'arthur'
    response: "Yes?"
fight:
  keyboard: [["Sorry"], ["Fight me"]]
  rules:
    - id: sorry
      pattern: '^sorry$'
      response: "Fine"
      next_mode: default
    - id: fight
      pattern: '^fight me$'
      response: "Bring it"
      anger: 1
oracle:
  menu: ["Predict", "Plague?", "Leave"]
  refusal: "No plague for you"
  farewell: "I'd sing now..."
  general: ["will sing."]
  subjects:
    - opening: "You "
      continuations: ["will dance."]
    - opening: "Arthur "
"#;

    #[test]
    fn test_builtin_store_is_valid() {
        let store = TemplateStore::builtin().unwrap();
        assert!(!store.rules(Mode::Default).is_empty());
        assert!(!store.rules(Mode::Fight).is_empty());
        assert!(store.rules(Mode::Oracle).is_empty());
        assert!(store.oracle.predictions.space_size() > 0);
    }

    #[test]
    fn test_test_store_loads() {
        let store = TemplateStore::from_yaml(TEST_STORE).unwrap();
        assert_eq!(store.rules(Mode::Default).len(), 5);
        assert_eq!(store.rules(Mode::Default)[0].id, "name");
        assert_eq!(store.rules(Mode::Fight)[0].next_mode, Some(Mode::Default));
        assert_eq!(store.keyboard(Mode::Oracle).unwrap().len(), 3);
        assert_eq!(store.keyboard(Mode::Default), None);
        assert_eq!(store.phrases.prediction_ack, "hmm...");
        assert_eq!(
            store.summary(),
            "5 default rule(s), 2 fight rule(s), 2 fight button(s), 3 possible prediction(s)"
        );
    }

    #[test]
    fn test_address_filter() {
        let store = TemplateStore::from_yaml(TEST_STORE).unwrap();
        assert!(store.is_addressed("hey ARTHUR"));
        assert!(!store.is_addressed("hey you"));
    }

    #[test]
    fn test_invalid_store_lists_all_problems() {
        let yaml = r#"
address: "("
default:
  - pattern: '(\w+)'
    response: "no slot"
    groups: [1]
  - pattern: 'x'
    response: "y"
    next_mode: party
fight:
  keyboard: []
oracle:
  menu: ["a", "b"]
  refusal: "r"
  farewell: "f"
  subjects: []
"#;
        let err = TemplateStore::from_yaml(yaml).unwrap_err();
        let TemplateError::Invalid { problems } = &err else {
            panic!("expected validation failure, got {err}");
        };
        assert_eq!(problems.len(), 6);
        assert!(problems.contains(&StoreProblem::EmptyFightKeyboard));
        assert!(problems.contains(&StoreProblem::Oracle(OracleProblem::MenuSize(2))));
        assert!(problems.contains(&StoreProblem::Oracle(OracleProblem::NoSubjects)));
        assert!(problems
            .iter()
            .any(|p| matches!(p, StoreProblem::Address(_))));
        let message = err.to_string();
        assert!(message.contains("default[0]"));
        assert!(message.contains("unknown mode 'party'"));
    }

    #[test]
    fn test_dead_fight_button() {
        let yaml = TEST_STORE.replace(r#"["Fight me"]"#, r#"["Dance"]"#);
        let err = TemplateStore::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("fight button 'Dance' matches no fight rule"));
    }

    #[test]
    fn test_parse_error() {
        let err = TemplateStore::from_yaml("default: [").unwrap_err();
        assert!(matches!(err, TemplateError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TemplateStore::load(Path::new("/nonexistent/arthur.yaml")).unwrap_err();
        assert!(matches!(err, TemplateError::Io { .. }));
    }
}
