//! Activity log and the state the console renders from.
//!
//! Every user-facing line goes through [`ActivityLog`], which writes it to the
//! `activity` tracing target and forwards it to the dashboard channel.

use crate::sequencer::QueuedTx;
use crate::status::WalletSnapshot;
use chrono::{DateTime, Local};
use core_logic::ACTIVITY_TARGET;
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Severity of an activity line. Drives the console color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Swap,
    System,
    Error,
    Success,
    Warning,
    Debug,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Swap => "swap",
            LogKind::System => "system",
            LogKind::Error => "error",
            LogKind::Success => "success",
            LogKind::Warning => "warning",
            LogKind::Debug => "debug",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub kind: LogKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum DashboardEvent {
    Log(LogLine),
    Wallet(WalletSnapshot),
    Queue(Vec<QueuedTx>),
}

/// Handle for emitting activity lines. Cheap to clone.
#[derive(Clone, Default)]
pub struct ActivityLog {
    sink: Option<mpsc::UnboundedSender<DashboardEvent>>,
    debug_enabled: bool,
}

impl ActivityLog {
    pub fn new(sink: mpsc::UnboundedSender<DashboardEvent>, debug_enabled: bool) -> Self {
        Self {
            sink: Some(sink),
            debug_enabled,
        }
    }

    /// Log that only reaches tracing.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn emit(&self, kind: LogKind, message: impl Into<String>) {
        let message = message.into();
        if kind == LogKind::Debug {
            debug!(target: ACTIVITY_TARGET, kind = kind.as_str(), "{}", message);
            if !self.debug_enabled {
                return;
            }
        } else {
            info!(target: ACTIVITY_TARGET, kind = kind.as_str(), "{}", message);
        }
        self.publish(DashboardEvent::Log(LogLine {
            at: Local::now(),
            kind,
            message,
        }));
    }

    pub fn publish(&self, event: DashboardEvent) {
        if let Some(sink) = &self.sink {
            // Receiver gone means the console has exited; nothing to render.
            let _ = sink.send(event);
        }
    }

    pub fn swap(&self, message: impl Into<String>) {
        self.emit(LogKind::Swap, message)
    }

    pub fn system(&self, message: impl Into<String>) {
        self.emit(LogKind::System, message)
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogKind::Error, message)
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(LogKind::Success, message)
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(LogKind::Warning, message)
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogKind::Debug, message)
    }
}

/// Latest view of everything the console shows.
#[derive(Debug)]
pub struct DashboardState {
    logs: VecDeque<LogLine>,
    capacity: usize,
    pub wallet: Option<WalletSnapshot>,
    pub queue: Vec<QueuedTx>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::with_capacity(500)
    }
}

impl DashboardState {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            logs: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            wallet: None,
            queue: Vec::new(),
        }
    }

    pub fn apply(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::Log(line) => {
                if self.logs.len() == self.capacity {
                    self.logs.pop_front();
                }
                self.logs.push_back(line);
            }
            DashboardEvent::Wallet(snapshot) => self.wallet = Some(snapshot),
            DashboardEvent::Queue(queue) => self.queue = queue,
        }
    }

    /// Applies everything currently buffered without waiting.
    pub fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<DashboardEvent>) {
        while let Ok(event) = rx.try_recv() {
            self.apply(event);
        }
    }

    pub fn logs(&self) -> impl Iterator<Item = &LogLine> {
        self.logs.iter()
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_lines_hidden_unless_enabled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let log = ActivityLog::new(tx, false);
        log.debug("Initial nonce: 7");
        log.swap("Swapping 0.100000 MON to USDC");

        let mut state = DashboardState::default();
        state.drain(&mut rx);
        let kinds: Vec<LogKind> = state.logs().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![LogKind::Swap]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let log = ActivityLog::new(tx, true);
        log.debug("Initial nonce: 7");
        state.drain(&mut rx);
        assert_eq!(state.logs().count(), 2);
    }

    #[test]
    fn test_log_history_is_bounded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let log = ActivityLog::new(tx, false);
        for i in 0..10 {
            log.system(format!("line {}", i));
        }

        let mut state = DashboardState::with_capacity(3);
        state.drain(&mut rx);
        let lines: Vec<&str> = state.logs().map(|l| l.message.as_str()).collect();
        assert_eq!(lines, vec!["line 7", "line 8", "line 9"]);

        state.clear_logs();
        assert_eq!(state.logs().count(), 0);
    }
}
