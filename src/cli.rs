//! Command-line arguments and the interactive console transport.

use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::session::{Keyboard, Outbound, Session};
use anyhow::Result;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "arthur", version, about = "Arthur, the moody pub singer chat bot")]
pub struct Args {
    /// Load only this config file (on top of built-in defaults)
    #[arg(long, env = "ARTHUR_CONFIG")]
    pub config: Option<PathBuf>,

    /// YAML template file to use instead of the built-in one
    #[arg(long, env = "ARTHUR_TEMPLATES")]
    pub templates: Option<PathBuf>,

    /// Anger needed to start a fight
    #[arg(long)]
    pub threshold: Option<u32>,

    /// Seed for fortune telling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print outbound messages as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Validate the templates and exit
    #[arg(long)]
    pub check: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Apply command-line overrides to a loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.templates {
            config.templates.path = Some(path.clone());
        }
        if self.threshold.is_some() {
            config.engine.anger_threshold = self.threshold;
        }
        if self.seed.is_some() {
            config.engine.seed = self.seed;
        }
    }
}

/// REPL-only commands, handled before the session sees the input
enum ReplCommand {
    Quit,
    Stats,
    Help,
}

impl ReplCommand {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "/quit" | "/exit" => Some(Self::Quit),
            "/stats" => Some(Self::Stats),
            "/help" => Some(Self::Help),
            _ => None,
        }
    }
}

const HELP: &str = "\
/start    begin a conversation (talk to Arthur by name)
/oracle   go straight to fortune telling (also /bible)
/cancel   end the conversation
/stats    show metrics
/quit     leave";

/// Console transport: reads lines, feeds the session, prints replies
pub struct Repl {
    session: Session,
    metrics: Arc<MetricsCollector>,
    json: bool,
    history: Option<PathBuf>,
}

impl Repl {
    pub fn new(
        session: Session,
        metrics: Arc<MetricsCollector>,
        json: bool,
        history: Option<PathBuf>,
    ) -> Self {
        Self {
            session,
            metrics,
            json,
            history,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()?;
        if let Some(path) = &self.history {
            // Missing history on first run is fine
            let _ = editor.load_history(path);
        }

        if !self.json {
            println!("Type /start to wake Arthur up, /help for commands.");
        }

        loop {
            let prompt = match self.session.mode() {
                Some(mode) => format!("[{}]> ", mode),
                None => "> ".to_string(),
            };
            let line = match editor.readline(&prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };
            if line.trim().is_empty() {
                continue;
            }
            editor.add_history_entry(line.as_str())?;

            match ReplCommand::parse(&line) {
                Some(ReplCommand::Quit) => break,
                Some(ReplCommand::Stats) => {
                    self.print_stats()?;
                    continue;
                }
                Some(ReplCommand::Help) => {
                    println!("{}", HELP);
                    continue;
                }
                None => {}
            }

            let reply = self.session.handle(&line);
            for message in &reply.messages {
                if let Some(delay) = message.delay() {
                    std::thread::sleep(delay);
                }
                self.print_message(message)?;
            }
        }

        if let Some(path) = &self.history {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if let Err(e) = editor.save_history(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to save history");
            }
        }
        Ok(())
    }

    fn print_message(&self, message: &Outbound) -> Result<()> {
        let mut out = io::stdout().lock();
        if self.json {
            writeln!(out, "{}", serde_json::to_string(message)?)?;
            return Ok(());
        }

        writeln!(out, "Arthur: {}", message.text)?;
        if let Keyboard::Show(rows) = &message.keyboard {
            for row in rows {
                let buttons: Vec<String> = row.iter().map(|c| format!("[ {} ]", c)).collect();
                writeln!(out, "    {}", buttons.join(" "))?;
            }
        }
        Ok(())
    }

    fn print_stats(&self) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(&self.metrics.json_snapshot())?);
        } else {
            print!("{}", self.metrics.prometheus_metrics()?);
        }
        Ok(())
    }
}
