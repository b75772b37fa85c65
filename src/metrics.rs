//! Conversation metrics.
//!
//! Provides Prometheus-compatible metrics and a JSON snapshot for:
//! - Turns by mode and outcome
//! - Mode transitions
//! - Predictions handed out
//! - Current anger level

use crate::mode::Mode;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;

const MODE_LABEL: &str = "mode";
const OUTCOME_LABEL: &str = "outcome";
const FROM_LABEL: &str = "from";
const TO_LABEL: &str = "to";

/// How a single inbound message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A rule or menu entry answered
    Matched,
    /// Nothing matched; a fallback phrase was sent
    Fallback,
    /// The message was not for the bot
    Ignored,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Matched => "matched",
            TurnOutcome::Fallback => "fallback",
            TurnOutcome::Ignored => "ignored",
        }
    }
}

/// Metrics collector for one bot process
pub struct MetricsCollector {
    registry: Registry,

    /// Inbound messages by mode and outcome
    turns_total: IntCounterVec,

    /// Mode changes by source and target
    transitions_total: IntCounterVec,

    /// Oracle predictions generated
    predictions_total: IntCounter,

    /// Anger of the active conversation
    anger: IntGauge,

    snapshot: RwLock<MetricsSnapshot>,
}

impl MetricsCollector {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let turns_total = IntCounterVec::new(
            Opts::new("arthur_turns_total", "Inbound messages handled"),
            &[MODE_LABEL, OUTCOME_LABEL],
        )?;
        registry.register(Box::new(turns_total.clone()))?;

        let transitions_total = IntCounterVec::new(
            Opts::new("arthur_transitions_total", "Conversation mode changes"),
            &[FROM_LABEL, TO_LABEL],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let predictions_total =
            IntCounter::new("arthur_predictions_total", "Oracle predictions generated")?;
        registry.register(Box::new(predictions_total.clone()))?;

        let anger = IntGauge::new("arthur_anger", "Anger of the active conversation")?;
        registry.register(Box::new(anger.clone()))?;

        Ok(Self {
            registry,
            turns_total,
            transitions_total,
            predictions_total,
            anger,
            snapshot: RwLock::new(MetricsSnapshot::default()),
        })
    }

    pub fn record_turn(&self, mode: Mode, outcome: TurnOutcome) {
        self.turns_total
            .with_label_values(&[mode.as_str(), outcome.as_str()])
            .inc();

        if let Ok(mut data) = self.snapshot.write() {
            data.turns += 1;
            *data
                .turns_by_outcome
                .entry(outcome.as_str().to_string())
                .or_default() += 1;
        }
    }

    /// Record a mode change; `to` is a mode name or "end"
    pub fn record_transition(&self, from: Mode, to: &str) {
        self.transitions_total
            .with_label_values(&[from.as_str(), to])
            .inc();

        if let Ok(mut data) = self.snapshot.write() {
            *data
                .transitions
                .entry(format!("{}->{}", from, to))
                .or_default() += 1;
        }
    }

    pub fn record_prediction(&self) {
        self.predictions_total.inc();
        if let Ok(mut data) = self.snapshot.write() {
            data.predictions += 1;
        }
    }

    pub fn set_anger(&self, anger: u32) {
        self.anger.set(i64::from(anger));
        if let Ok(mut data) = self.snapshot.write() {
            data.anger = anger;
        }
    }

    /// Prometheus text exposition
    pub fn prometheus_metrics(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn json_snapshot(&self) -> MetricsSnapshot {
        self.snapshot
            .read()
            .map(|data| data.clone())
            .unwrap_or_default()
    }
}

/// Snapshot of metrics for JSON output
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub turns: u64,
    pub turns_by_outcome: BTreeMap<String, u64>,
    pub transitions: BTreeMap<String, u64>,
    pub predictions: u64,
    pub anger: u32,
}
