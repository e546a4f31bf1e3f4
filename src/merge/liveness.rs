//! Liveness Watcher
//!
//! Background thread that polls the size of a growing file and reports
//! progress whenever it grew. Keeps a supervisor from considering a long
//! merge stalled between per-entry progress signals.
//!
//! The watcher is stopped and joined when dropped, so every exit path of
//! the owning scope (success, error, unwinding) reclaims the thread.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::{trace, warn};

use crate::counters::ProgressReporter;
use crate::error::Result;

/// Handle of a running liveness thread
pub struct LivenessWatcher {
    /// Dropping the sender cancels the thread
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LivenessWatcher {
    /// Start watching `path`, polling every `interval`
    pub fn spawn(
        path: &Path,
        interval: Duration,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<Self> {
        let (cancel, cancelled) = channel::bounded::<()>(1);
        let path: PathBuf = path.to_path_buf();

        let handle = thread::Builder::new()
            .name("merge-liveness".to_string())
            .spawn(move || {
                let mut last_size = 0u64;
                loop {
                    match cancelled.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let size = fs::metadata(&path).map_or(last_size, |m| m.len());
                            if size > last_size {
                                trace!(path = %path.display(), size, "output grew");
                                last_size = size;
                                progress.progress();
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(Self {
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.cancel.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("liveness watcher panicked");
            }
        }
    }
}

impl Drop for LivenessWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
