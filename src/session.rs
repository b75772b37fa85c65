//! Chat session: the glue between a transport and one `Engine`.
//!
//! The session tracks the active mode, handles the lifecycle commands
//! (`/start`, `/cancel`, `/oracle`) and turns engine responses into
//! outbound messages with the right quick-reply keyboard attached.

use crate::engine::{Engine, EngineSettings, Response};
use crate::metrics::{MetricsCollector, TurnOutcome};
use crate::mode::{Mode, Transition};
use crate::templates::TemplateStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Pause before a flagged prediction
pub const DEFAULT_PREDICTION_DELAY: Duration = Duration::from_millis(500);

/// Lifecycle commands understood in any mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Cancel,
    Oracle,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "/start" => Some(Self::Start),
            "/cancel" => Some(Self::Cancel),
            "/oracle" | "/bible" => Some(Self::Oracle),
            _ => None,
        }
    }
}

/// What to do with the quick-reply keyboard when a message is sent
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "action", content = "rows", rename_all = "snake_case")]
pub enum Keyboard {
    #[default]
    Unchanged,
    Show(Vec<Vec<String>>),
    Remove,
}

/// One message for the transport to deliver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outbound {
    pub text: String,
    pub keyboard: Keyboard,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_before_ms: Option<u64>,
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::Unchanged,
            delay_before_ms: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = keyboard;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_before_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay_before_ms.map(Duration::from_millis)
    }
}

/// Result of handling one inbound message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub messages: Vec<Outbound>,
    pub transition: Transition,
}

impl Reply {
    fn ignored() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub engine: EngineSettings,
    pub prediction_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            prediction_delay: DEFAULT_PREDICTION_DELAY,
        }
    }
}

struct Conversation {
    engine: Engine,
    mode: Mode,
}

pub struct Session {
    store: Arc<TemplateStore>,
    settings: SessionSettings,
    conversation: Option<Conversation>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Session {
    pub fn new(store: Arc<TemplateStore>, settings: SessionSettings) -> Self {
        Self {
            store,
            settings,
            conversation: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Active mode, or `None` before `/start` and after `/cancel`
    pub fn mode(&self) -> Option<Mode> {
        self.conversation.as_ref().map(|c| c.mode)
    }

    pub fn engine(&self) -> Option<&Engine> {
        self.conversation.as_ref().map(|c| &c.engine)
    }

    /// Handle one inbound message
    pub fn handle(&mut self, text: &str) -> Reply {
        if let Some(command) = Command::parse(text) {
            return match command {
                Command::Start => self.start(),
                Command::Cancel => self.cancel(),
                Command::Oracle => self.jump_to_oracle(),
            };
        }

        let Some(conversation) = self.conversation.as_mut() else {
            return Reply::ignored();
        };
        let mode = conversation.mode;

        let response = match mode {
            Mode::Default if !self.store.is_addressed(text) => None,
            Mode::Default => Some(conversation.engine.deal(text)),
            // Only quick replies here; unknown commands are not free text
            _ if text.starts_with('/') => None,
            Mode::Fight => Some(conversation.engine.fight(text)),
            Mode::Oracle => conversation.engine.consult(text),
        };
        let anger = conversation.engine.anger();

        let Some(response) = response else {
            self.record_turn(mode, TurnOutcome::Ignored);
            return Reply::ignored();
        };

        let outcome = if response.is_rule_match() || mode == Mode::Oracle {
            TurnOutcome::Matched
        } else {
            TurnOutcome::Fallback
        };
        self.record_turn(mode, outcome);
        if let Some(metrics) = &self.metrics {
            metrics.set_anger(anger);
            if response.flagged {
                metrics.record_prediction();
            }
        }

        self.render(mode, response)
    }

    fn start(&mut self) -> Reply {
        if self.conversation.is_some() {
            tracing::info!("restarting conversation");
        } else {
            tracing::info!("conversation started");
        }
        self.conversation = Some(Conversation {
            engine: Engine::new(Arc::clone(&self.store), &self.settings.engine),
            mode: Mode::Default,
        });
        if let Some(metrics) = &self.metrics {
            metrics.set_anger(0);
        }

        Reply {
            messages: vec![
                Outbound::text(&self.store.phrases.greeting).with_keyboard(Keyboard::Remove)
            ],
            transition: Transition::To(Mode::Default),
        }
    }

    fn cancel(&mut self) -> Reply {
        let Some(conversation) = self.conversation.take() else {
            return Reply::ignored();
        };
        tracing::info!(
            mode = %conversation.mode,
            anger = conversation.engine.anger(),
            "conversation ended"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(conversation.mode, "end");
        }

        Reply {
            messages: vec![
                Outbound::text(&self.store.phrases.farewell).with_keyboard(Keyboard::Remove)
            ],
            transition: Transition::End,
        }
    }

    fn jump_to_oracle(&mut self) -> Reply {
        let Some(from) = self.mode() else {
            return Reply::ignored();
        };
        if from != Mode::Oracle {
            self.switch_mode(from, Mode::Oracle);
        }
        Reply {
            messages: self.entry_messages(Mode::Oracle),
            transition: Transition::To(Mode::Oracle),
        }
    }

    /// Turn an engine response into messages and apply its transition
    fn render(&mut self, from: Mode, response: Response) -> Reply {
        let target = response.transition.target().filter(|to| *to != from);
        let mut messages = Vec::new();

        if response.flagged {
            messages.push(Outbound::text(&self.store.phrases.prediction_ack));
        }

        let keyboard = match (target, self.store.keyboard(from)) {
            (None, Some(rows)) => Keyboard::Show(rows),
            (None, None) => Keyboard::Unchanged,
            (Some(_), Some(_)) => Keyboard::Remove,
            (Some(_), None) => Keyboard::Unchanged,
        };
        let mut main = Outbound::text(response.text).with_keyboard(keyboard);
        if response.flagged {
            main = main.with_delay(self.settings.prediction_delay);
        }
        messages.push(main);

        let transition = match target {
            Some(to) => {
                self.switch_mode(from, to);
                messages.extend(self.entry_messages(to));
                Transition::To(to)
            }
            None => Transition::Stay,
        };

        Reply {
            messages,
            transition,
        }
    }

    /// Messages that open a mode
    fn entry_messages(&self, mode: Mode) -> Vec<Outbound> {
        let phrases = &self.store.phrases;
        match mode {
            Mode::Default => Vec::new(),
            Mode::Fight => vec![Outbound::text(&phrases.fight_entry)
                .with_keyboard(Keyboard::Show(self.store.fight_keyboard().to_vec()))],
            Mode::Oracle => vec![Outbound::text(&phrases.oracle_intro)
                .with_keyboard(Keyboard::Show(self.store.oracle.menu.keyboard()))],
        }
    }

    fn switch_mode(&mut self, from: Mode, to: Mode) {
        if let Some(conversation) = self.conversation.as_mut() {
            conversation.mode = to;
        }
        tracing::info!(%from, %to, "mode changed");
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(from, to.as_str());
        }
    }

    fn record_turn(&self, mode: Mode, outcome: TurnOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_turn(mode, outcome);
        }
    }
}
