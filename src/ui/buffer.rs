use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::ui::logs::{LogLine, LogSource};

pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Bounded ring buffer of captured hub output, shared between the capture
/// tasks and readers. Has its own lock, independent of the hub status.
pub struct LogBuffer {
    lines: Mutex<VecDeque<LogLine>>,
    capacity: usize,
    live: broadcast::Sender<LogLine>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(256);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            live,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogLine>> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Push a log line, evicting the oldest if at capacity.
    pub fn push(&self, line: LogLine) {
        {
            let mut lines = self.lock();
            while lines.len() >= self.capacity {
                lines.pop_front();
            }
            lines.push_back(line.clone());
        }
        // No receivers is fine.
        let _ = self.live.send(line);
    }

    pub fn append(&self, source: LogSource, text: impl Into<String>) {
        self.push(LogLine::new(source, text));
    }

    /// Snapshot of the last `limit` lines, oldest first. `0` or a limit past
    /// the buffer length returns everything.
    pub fn tail(&self, limit: usize) -> Vec<LogLine> {
        let lines = self.lock();
        let skip = if limit == 0 {
            0
        } else {
            lines.len().saturating_sub(limit)
        };
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Receive lines as they are pushed.
    pub fn subscribe(&self) -> broadcast::Receiver<LogLine> {
        self.live.subscribe()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
