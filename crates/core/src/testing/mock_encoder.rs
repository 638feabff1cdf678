//! Mock encoder launcher and process for testing.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::supervisor::{EncodePlan, EncoderError, EncoderExit, EncoderLauncher, EncoderProcess};

/// Control handle for one mock process, kept by the launcher so tests can
/// end the "process" from outside.
#[derive(Clone)]
struct ProcessControl {
    pid: u32,
    exit_tx: mpsc::UnboundedSender<EncoderExit>,
}

/// Mock implementation of [`EncoderLauncher`].
///
/// Launched processes run until told otherwise:
/// - a quit signal makes the process exit cleanly (unless configured to
///   ignore it, to exercise the kill escalation),
/// - [`crash_latest`](MockLauncher::crash_latest) simulates an unexpected
///   encoder exit,
/// - [`fail_next_spawn`](MockLauncher::fail_next_spawn) makes the next
///   launch fail before a process exists.
pub struct MockLauncher {
    launched: Mutex<Vec<EncodePlan>>,
    controls: Mutex<Vec<ProcessControl>>,
    pid_counter: AtomicU32,
    fail_next: Mutex<Option<String>>,
    ignore_quit: AtomicBool,
    quit_signals: Arc<AtomicUsize>,
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            launched: Mutex::new(Vec::new()),
            controls: Mutex::new(Vec::new()),
            pid_counter: AtomicU32::new(1000),
            fail_next: Mutex::new(None),
            ignore_quit: AtomicBool::new(false),
            quit_signals: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Plans passed to `launch` so far.
    pub fn launched_plans(&self) -> Vec<EncodePlan> {
        self.launched.lock().unwrap().clone()
    }

    /// Number of processes spawned.
    pub fn spawn_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    /// Number of quit signals delivered across all processes.
    pub fn signals_sent(&self) -> usize {
        self.quit_signals.load(Ordering::SeqCst)
    }

    /// Make the next `launch` call fail with the given message.
    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        *self.fail_next.lock().unwrap() = Some(message.into());
    }

    /// Ignore quit signals so stops escalate to the kill path.
    pub fn ignore_quit_signals(&self) {
        self.ignore_quit.store(true, Ordering::SeqCst);
    }

    /// Terminate the most recently launched process with the given exit.
    pub fn crash_latest(&self, message: impl Into<String>) {
        let controls = self.controls.lock().unwrap();
        if let Some(control) = controls.last() {
            let _ = control.exit_tx.send(EncoderExit::Failed {
                message: message.into(),
            });
        }
    }

    /// Terminate the process with the given pid cleanly.
    pub fn finish(&self, pid: u32) {
        let controls = self.controls.lock().unwrap();
        if let Some(control) = controls.iter().find(|c| c.pid == pid) {
            let _ = control.exit_tx.send(EncoderExit::Clean);
        }
    }
}

#[async_trait]
impl EncoderLauncher for MockLauncher {
    async fn launch(&self, plan: &EncodePlan) -> Result<Box<dyn EncoderProcess>, EncoderError> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(EncoderError::Spawn(message));
        }

        self.launched.lock().unwrap().push(plan.clone());

        let pid = self.pid_counter.fetch_add(1, Ordering::SeqCst);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        self.controls.lock().unwrap().push(ProcessControl {
            pid,
            exit_tx: exit_tx.clone(),
        });

        Ok(Box::new(MockProcess {
            pid,
            exit_tx,
            exit_rx,
            ignore_quit: self.ignore_quit.load(Ordering::SeqCst),
            quit_signals: Arc::clone(&self.quit_signals),
            exited: None,
        }))
    }
}

/// Mock encoder process; "runs" until an exit is injected.
pub struct MockProcess {
    pid: u32,
    exit_tx: mpsc::UnboundedSender<EncoderExit>,
    exit_rx: mpsc::UnboundedReceiver<EncoderExit>,
    ignore_quit: bool,
    quit_signals: Arc<AtomicUsize>,
    exited: Option<EncoderExit>,
}

#[async_trait]
impl EncoderProcess for MockProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn wait(&mut self) -> Result<EncoderExit, EncoderError> {
        if let Some(exit) = self.exited.clone() {
            return Ok(exit);
        }
        let exit = self.exit_rx.recv().await.unwrap_or(EncoderExit::Clean);
        self.exited = Some(exit.clone());
        Ok(exit)
    }

    async fn signal_quit(&mut self) -> Result<(), EncoderError> {
        self.quit_signals.fetch_add(1, Ordering::SeqCst);
        if !self.ignore_quit {
            let _ = self.exit_tx.send(EncoderExit::Clean);
        }
        Ok(())
    }

    async fn kill(&mut self) -> Result<(), EncoderError> {
        let _ = self.exit_tx.send(EncoderExit::Failed {
            message: "killed".to_string(),
        });
        Ok(())
    }
}
