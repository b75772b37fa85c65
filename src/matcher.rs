//! First-match-wins search over an ordered rule table.

use crate::mode::Mode;
use crate::templates::Rule;

/// Per-engine record of which rules have already fired.
///
/// Indexed by position in the rule table it was created for, so two rules
/// never share a flag and a shared store is never mutated.
#[derive(Debug, Clone, Default)]
pub struct RuleUsage {
    asked: Vec<bool>,
}

impl RuleUsage {
    pub fn for_rules(rules: &[Rule]) -> Self {
        Self {
            asked: vec![false; rules.len()],
        }
    }

    pub fn is_asked(&self, index: usize) -> bool {
        self.asked.get(index).copied().unwrap_or(false)
    }

    fn mark(&mut self, index: usize) {
        if index >= self.asked.len() {
            self.asked.resize(index + 1, false);
        }
        self.asked[index] = true;
    }

    /// Number of rules that have fired at least once
    pub fn asked_count(&self) -> usize {
        self.asked.iter().filter(|a| **a).count()
    }
}

/// Outcome of a successful search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub rule_index: usize,
    pub rule_id: String,
    pub text: String,
    pub anger_delta: u32,
    pub next_mode: Option<Mode>,
}

/// Find the first rule whose pattern occurs in `text` and render its reply.
///
/// Marks the winning rule as asked. Returns `None` when nothing matched,
/// which is different from a match whose reply happens to be empty.
pub fn search(text: &str, rules: &[Rule], usage: &mut RuleUsage) -> Option<Match> {
    rules.iter().enumerate().find_map(|(index, rule)| {
        let caps = rule.captures(text)?;
        let values = rule.extract(&caps);
        let reply = rule.template(usage.is_asked(index)).render(&values);
        usage.mark(index);
        Some(Match {
            rule_index: index,
            rule_id: rule.id.clone(),
            text: reply,
            anger_delta: rule.anger_delta,
            next_mode: rule.next_mode,
        })
    })
}
