//! Progress narration for a running build

use colored::Colorize;
use std::sync::Mutex;

/// Sink for human-readable build progress
pub trait Ui: Send + Sync {
    /// Announce a new phase of the build
    fn say(&self, message: &str);

    /// Detail line under the current phase
    fn message(&self, message: &str);

    fn error(&self, message: &str);
}

/// Writes narration to the terminal and mirrors it to tracing
#[derive(Debug, Default, Clone)]
pub struct ConsoleUi {
    prefix: Option<String>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every line with the build name
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn decorate(&self, message: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}: {}", prefix, message),
            None => message.to_string(),
        }
    }
}

impl Ui for ConsoleUi {
    fn say(&self, message: &str) {
        tracing::info!("{}", message);
        println!("{} {}", "==>".green().bold(), self.decorate(message).bold());
    }

    fn message(&self, message: &str) {
        tracing::debug!("{}", message);
        println!("    {}", self.decorate(message));
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
        eprintln!("{} {}", "==>".red().bold(), self.decorate(message).red());
    }
}

/// One line captured by [`RecordingUi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiLine {
    Say(String),
    Message(String),
    Error(String),
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct RecordingUi {
    lines: Mutex<Vec<UiLine>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<UiLine> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                UiLine::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, line: UiLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl Ui for RecordingUi {
    fn say(&self, message: &str) {
        self.push(UiLine::Say(message.to_string()));
    }

    fn message(&self, message: &str) {
        self.push(UiLine::Message(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(UiLine::Error(message.to_string()));
    }
}
