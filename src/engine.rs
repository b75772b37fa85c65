//! Conversational engine.
//!
//! One `Engine` per conversation. It owns the anger counter, the per-rule
//! usage flags and the prediction RNG; the caller owns the current mode and
//! picks `deal`, `fight` or `consult` accordingly.

use crate::matcher::{self, Match, RuleUsage};
use crate::mode::{Mode, Transition};
use crate::oracle::OracleChoice;
use crate::templates::TemplateStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;

/// Anger at which Default mode turns into a fight
pub const DEFAULT_ANGER_THRESHOLD: u32 = 8;

/// Engine reply for one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub text: String,
    pub transition: Transition,
    /// Oracle predictions only: the transport should acknowledge and pause first
    pub flagged: bool,
    /// Id of the rule that produced the text; `None` for fallbacks and oracle replies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl Response {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            transition: Transition::Stay,
            flagged: false,
            rule: None,
        }
    }

    pub fn with_rule(mut self, id: impl Into<String>) -> Self {
        self.rule = Some(id.into());
        self
    }

    /// Whether a rule table entry answered, as opposed to a fallback phrase
    pub fn is_rule_match(&self) -> bool {
        self.rule.is_some()
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self
    }

    pub fn flagged(mut self) -> Self {
        self.flagged = true;
        self
    }
}

/// Tunables for a new engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub anger_threshold: u32,
    /// Fixed seed for the prediction RNG; entropy when unset
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            anger_threshold: DEFAULT_ANGER_THRESHOLD,
            seed: None,
        }
    }
}

pub struct Engine {
    store: Arc<TemplateStore>,
    anger: u32,
    threshold: u32,
    default_usage: RuleUsage,
    fight_usage: RuleUsage,
    rng: StdRng,
}

impl Engine {
    pub fn new(store: Arc<TemplateStore>, settings: &EngineSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            default_usage: RuleUsage::for_rules(store.rules(Mode::Default)),
            fight_usage: RuleUsage::for_rules(store.rules(Mode::Fight)),
            store,
            anger: 0,
            threshold: settings.anger_threshold,
            rng,
        }
    }

    pub fn anger(&self) -> u32 {
        self.anger
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Default mode. Once anger reaches the threshold every matched rule
    /// leads into a fight, whatever transition the rule asked for.
    pub fn deal(&mut self, text: &str) -> Response {
        let Some(found) = self.search(Mode::Default, text) else {
            return Response::new(&self.store.phrases.default_fallback);
        };

        let mut transition = Transition::from(found.next_mode);
        if self.anger >= self.threshold {
            tracing::info!(
                anger = self.anger,
                threshold = self.threshold,
                rule = %found.rule_id,
                "anger threshold reached, starting a fight"
            );
            transition = Transition::To(Mode::Fight);
        }
        Response::new(found.text)
            .with_transition(transition)
            .with_rule(found.rule_id)
    }

    /// Fight mode. Once anger has cooled to half the threshold every matched
    /// rule returns to Default, whatever transition the rule asked for.
    pub fn fight(&mut self, text: &str) -> Response {
        let Some(found) = self.search(Mode::Fight, text) else {
            return Response::new(&self.store.phrases.fight_fallback);
        };

        let mut transition = Transition::from(found.next_mode);
        if self.anger <= self.threshold / 2 {
            tracing::info!(
                anger = self.anger,
                threshold = self.threshold,
                "calmed down, leaving the fight"
            );
            transition = Transition::To(Mode::Default);
        }
        Response::new(found.text)
            .with_transition(transition)
            .with_rule(found.rule_id)
    }

    /// Oracle mode. Only exact menu captions are answered; `None` means the
    /// caller should ignore the message.
    pub fn consult(&mut self, text: &str) -> Option<Response> {
        let oracle = &self.store.oracle;
        let response = match oracle.menu.choice(text)? {
            OracleChoice::Predict => {
                let prediction = oracle.predictions.predict(&mut self.rng);
                tracing::debug!(%prediction, "prediction made");
                Response::new(prediction).flagged()
            }
            OracleChoice::Refuse => Response::new(&oracle.refusal),
            OracleChoice::Leave => {
                Response::new(&oracle.farewell).with_transition(Transition::To(Mode::Default))
            }
        };
        Some(response)
    }

    fn search(&mut self, mode: Mode, text: &str) -> Option<Match> {
        let usage = match mode {
            Mode::Fight => &mut self.fight_usage,
            _ => &mut self.default_usage,
        };
        let found = matcher::search(text, self.store.rules(mode), usage)?;
        self.anger = self.anger.saturating_add(found.anger_delta);
        tracing::debug!(
            %mode,
            rule = %found.rule_id,
            delta = found.anger_delta,
            anger = self.anger,
            "rule matched"
        );
        Some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::store::tests::TEST_STORE;
    use std::collections::HashSet;

    fn engine() -> Engine {
        let store = Arc::new(TemplateStore::from_yaml(TEST_STORE).unwrap());
        Engine::new(
            store,
            &EngineSettings {
                anger_threshold: 8,
                seed: Some(1),
            },
        )
    }

    #[test]
    fn test_fresh_engine() {
        let e = engine();
        assert_eq!(e.anger(), 0);
        assert_eq!(e.threshold(), 8);
    }

    #[test]
    fn test_deal_fallback() {
        let mut e = engine();
        let r = e.deal("nobody here");
        assert_eq!(r, Response::new("what?"));
        assert!(!r.is_rule_match());
        assert_eq!(e.anger(), 0);
    }

    #[test]
    fn test_deal_applies_anger_without_transition() {
        let mut e = engine();
        let r = e.deal("arthur you idiot");
        assert_eq!(r.text, "Watch it");
        assert_eq!(r.transition, Transition::Stay);
        assert!(!r.flagged);
        assert_eq!(r.rule.as_deref(), Some("insult"));
        assert_eq!(e.anger(), 3);
    }

    #[test]
    fn test_deal_alternative_and_groups() {
        let mut e = engine();
        assert_eq!(e.deal("arthur, call me Sam").text, "Nice to meet you, Sam");
        assert_eq!(e.deal("arthur, call me Sam").text, "I know, Sam");
        assert_eq!(e.deal("arthur, call me Jo").text, "I know, Jo");
    }

    #[test]
    fn test_deal_passes_rule_transition_through() {
        let mut e = engine();
        let r = e.deal("arthur tell my fortune");
        assert_eq!(r.transition, Transition::To(Mode::Oracle));
    }

    #[test]
    fn test_anger_escalates_into_fight() {
        let mut e = engine();
        assert_eq!(e.deal("arthur shove").transition, Transition::Stay);
        assert_eq!(e.anger(), 6);
        let r = e.deal("arthur shove");
        assert_eq!(e.anger(), 12);
        assert_eq!(r.transition, Transition::To(Mode::Fight));

        // Every later match is forced into a fight, even one asking for Oracle
        let r = e.deal("arthur tell my fortune");
        assert_eq!(r.transition, Transition::To(Mode::Fight));
        let r = e.deal("arthur");
        assert_eq!(r.transition, Transition::To(Mode::Fight));
    }

    #[test]
    fn test_no_match_never_forces_transition() {
        let mut e = engine();
        e.deal("arthur shove");
        e.deal("arthur shove");
        assert_eq!(e.deal("silence").transition, Transition::Stay);
        assert_eq!(e.fight("dance").transition, Transition::Stay);
        assert_eq!(e.fight("dance").text, "buttons!");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let store = Arc::new(TemplateStore::from_yaml(TEST_STORE).unwrap());
        let mut e = Engine::new(
            store,
            &EngineSettings {
                anger_threshold: 6,
                seed: None,
            },
        );
        assert_eq!(e.deal("arthur shove").transition, Transition::To(Mode::Fight));
    }

    #[test]
    fn test_fight_cool_anger_returns_to_default() {
        let mut e = engine();
        e.deal("arthur you fool");
        assert_eq!(e.anger(), 3);
        // The rule itself asks for no transition; low anger still ends the fight
        let r = e.fight("Fight me");
        assert_eq!(r.text, "Bring it");
        assert_eq!(e.anger(), 4);
        assert_eq!(r.transition, Transition::To(Mode::Default));
    }

    #[test]
    fn test_fight_hot_anger_stays() {
        let mut e = engine();
        e.deal("arthur shove");
        let r = e.fight("fight me");
        assert_eq!(e.anger(), 7);
        assert_eq!(r.transition, Transition::Stay);

        // A rule-requested exit is honoured while still angry
        let r = e.fight("Sorry");
        assert_eq!(r.text, "Fine");
        assert_eq!(r.transition, Transition::To(Mode::Default));
    }

    #[test]
    fn test_anger_never_decreases() {
        let mut e = engine();
        let inputs = [
            "arthur", "arthur idiot", "x", "arthur shove", "arthur fool", "y", "arthur shove",
        ];
        let mut last = e.anger();
        for input in inputs {
            e.deal(input);
            assert!(e.anger() >= last);
            last = e.anger();
            e.fight("fight me");
            assert!(e.anger() >= last);
            last = e.anger();
        }
    }

    #[test]
    fn test_scenario_from_zero_to_fight() {
        let mut e = engine();
        let r = e.deal("arthur you idiot");
        assert_eq!(r, Response::new("Watch it").with_rule("insult"));
        assert_eq!(e.anger(), 3);

        for _ in 0..3 {
            e.deal("arthur shove");
        }
        assert!(e.anger() > 8);
        assert_eq!(e.deal("arthur").transition, Transition::To(Mode::Fight));
    }

    #[test]
    fn test_consult_menu() {
        let mut e = engine();
        let r = e.consult("Plague?").unwrap();
        assert_eq!(r, Response::new("No plague for you"));

        let r = e.consult("Leave").unwrap();
        assert_eq!(r.text, "I'd sing now...");
        assert_eq!(r.transition, Transition::To(Mode::Default));

        assert_eq!(e.consult("tell me something"), None);
        assert_eq!(e.consult("predict"), None);
    }

    #[test]
    fn test_consult_predictions_are_flagged_and_bounded() {
        let mut e = engine();
        let allowed: HashSet<&str> = ["You will sing.", "You will dance.", "Arthur will sing."]
            .into_iter()
            .collect();
        for _ in 0..1000 {
            let r = e.consult("Predict").unwrap();
            assert!(r.flagged);
            assert_eq!(r.transition, Transition::Stay);
            assert!(allowed.contains(r.text.as_str()), "unexpected {}", r.text);
        }
        assert_eq!(e.anger(), 0);
    }

    #[test]
    fn test_engines_do_not_share_usage() {
        let store = Arc::new(TemplateStore::from_yaml(TEST_STORE).unwrap());
        let settings = EngineSettings::default();
        let mut a = Engine::new(Arc::clone(&store), &settings);
        let mut b = Engine::new(store, &settings);
        assert_eq!(a.deal("arthur idiot").text, "Watch it");
        assert_eq!(a.deal("arthur idiot").text, "Again?");
        assert_eq!(b.deal("arthur idiot").text, "Watch it");
        assert_eq!(b.anger(), 3);
    }
}
