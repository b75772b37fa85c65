//! Template store: rule tables loaded from YAML and validated up front.

pub mod response;
pub mod rule;
pub mod store;

pub use response::ResponseTemplate;
pub use rule::{GroupRef, Rule, RuleProblem, RuleSpec};
pub use store::{Phrases, StoreProblem, TemplateError, TemplateStore};
