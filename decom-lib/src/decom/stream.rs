use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam::sync::WaitGroup;
use tracing::{debug, warn};

use crate::prelude::*;

/// Post-processor for stream field bytes, e.g., an external viewer.
///
/// Handlers run on a background pool and never hold up decoding. Failures are logged.
pub trait StreamHandler: Send + Sync {
    /// Process the bytes of stream `field`, which have been written to `path`. `handler` is
    /// the handler name configured on the field.
    ///
    /// # Errors
    /// Any failure processing the data.
    fn run(&self, handler: &str, field: &str, path: &Path) -> std::io::Result<()>;
}

/// Runs the handler name as a program with the data file path as its only argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandStreamHandler;

impl StreamHandler for CommandStreamHandler {
    fn run(&self, handler: &str, field: &str, path: &Path) -> std::io::Result<()> {
        let status = Command::new(handler).arg(path).status()?;
        if status.success() {
            debug!(handler, field, "stream handler complete");
            Ok(())
        } else {
            Err(std::io::Error::other(format!(
                "{handler} exited with {status}"
            )))
        }
    }
}

/// Owns the pool stream handlers run on.
pub(crate) struct StreamDispatch {
    handler: Arc<dyn StreamHandler>,
    pool: rayon::ThreadPool,
    // each queued job holds a clone until it completes
    pending: Mutex<WaitGroup>,
}

impl StreamDispatch {
    pub fn new(handler: Arc<dyn StreamHandler>, num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("decom::stream{i}"))
            .num_threads(num_threads)
            .build()?;
        Ok(StreamDispatch {
            handler,
            pool,
            pending: Mutex::default(),
        })
    }

    /// Persist `data` to a scratch file and hand it to the handler in the background.
    pub fn dispatch(&self, handler: &str, field: &str, data: &[u8]) {
        let mut file = match tempfile::NamedTempFile::new() {
            Ok(f) => f,
            Err(err) => {
                warn!(field, "failed to create stream scratch file: {err}");
                return;
            }
        };
        if let Err(err) = file.write_all(data).and_then(|()| file.flush()) {
            warn!(field, "failed to write stream scratch file: {err}");
            return;
        }

        let runner = self.handler.clone();
        let handler = handler.to_string();
        let field = field.to_string();
        let done = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.pool.spawn(move || {
            if let Err(err) = runner.run(&handler, &field, file.path()) {
                warn!(handler = %handler, field = %field, "stream handler failed: {err}");
            }
            // scratch file is removed on drop
            drop(file);
            drop(done);
        });
    }

    /// Block until every job dispatched so far has completed.
    pub fn wait(&self) {
        let pending = {
            let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        pending.wait();
    }
}

impl std::fmt::Debug for StreamDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDispatch")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}
