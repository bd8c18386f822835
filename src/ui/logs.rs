use chrono::{DateTime, Utc};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tokio::sync::broadcast;

/// Severity guessed from the first level keyword in a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        let level = match word.to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" | "fatal" => LogLevel::Error,
            _ => return None,
        };
        Some(level)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static LEVEL_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(trace|debug|info|warn|warning|error|fatal)\b").expect("valid regex")
});

/// Orchestrators print levels in many shapes (`INFO`, `level=info`,
/// `"level":"error"`); the first keyword wins.
pub fn detect_log_level(text: &str) -> Option<LogLevel> {
    LEVEL_KEYWORD
        .find(text)
        .and_then(|m| LogLevel::from_keyword(m.as_str()))
}

/// Where a captured line came from. `Hub` lines are written by the
/// supervisor itself (exit notices, unresolved secrets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Stdout,
    Stderr,
    Hub,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Stdout => "stdout",
            LogSource::Stderr => "stderr",
            LogSource::Hub => "hub",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
}

impl LogLine {
    pub fn new(source: LogSource, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            timestamp: Utc::now(),
            level: detect_log_level(&text),
            source,
            text,
        }
    }

    /// `[ts] [source] text`, for replaying the buffer after a failed start.
    pub fn render_plain(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.source.as_str(),
            self.text
        )
    }
}

/// Streams live hub output to the terminal.
pub struct LogWriter {
    rx: broadcast::Receiver<LogLine>,
    use_color: bool,
}

impl LogWriter {
    pub fn new(rx: broadcast::Receiver<LogLine>) -> Self {
        Self {
            rx,
            use_color: std::io::stdout().is_terminal(),
        }
    }

    /// `source | LEVEL text`, colored when stdout is a terminal.
    pub fn format_line(&self, line: &LogLine) -> String {
        let tag = format!("{:>6}", line.source.as_str());
        let level = line
            .level
            .map(|l| format!("{:>5} ", l.as_str()))
            .unwrap_or_default();

        if !self.use_color {
            return format!("{tag} | {level}{}", line.text);
        }

        let tag = match line.source {
            LogSource::Stdout => tag.cyan().to_string(),
            LogSource::Stderr => tag.yellow().to_string(),
            LogSource::Hub => tag.magenta().bold().to_string(),
        };
        let level = match line.level {
            Some(LogLevel::Error) => level.red().to_string(),
            Some(LogLevel::Warn) => level.yellow().to_string(),
            Some(LogLevel::Info) => level.green().to_string(),
            Some(LogLevel::Debug) => level.blue().to_string(),
            Some(LogLevel::Trace) => level.dimmed().to_string(),
            None => level,
        };
        let text = if line.source == LogSource::Stderr {
            line.text.red().to_string()
        } else {
            line.text.clone()
        };
        format!("{tag} {} {level}{text}", "|".dimmed())
    }

    /// Print lines until the sender is dropped.
    pub async fn run(mut self) {
        loop {
            match self.rx.recv().await {
                Ok(line) => println!("{}", self.format_line(&line)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "log writer lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
