//! Arthur: a scripted chat bot with a temper.
//!
//! Messages are matched against ordered regex rule tables, one per
//! conversation mode. Insults raise Arthur's anger until he picks a fight;
//! once calm he goes back to chatting, and he will tell your fortune on
//! request.

pub mod cli;
pub mod config;
pub mod engine;
pub mod matcher;
pub mod metrics;
pub mod mode;
pub mod oracle;
pub mod session;
pub mod templates;

pub use engine::{Engine, EngineSettings, Response};
pub use mode::{Mode, Transition};
pub use session::{Keyboard, Outbound, Reply, Session, SessionSettings};
pub use templates::{TemplateError, TemplateStore};
