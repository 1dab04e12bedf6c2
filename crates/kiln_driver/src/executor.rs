//! Runs compiler work on a dedicated thread with a large stack.
//!
//! Deep tree traversals need more stack than a typical thread has, so each
//! call moves the compiler state into a freshly spawned, named thread and the
//! caller blocks until it is handed back. With a timeout, a call that does not
//! finish in time is abandoned: the state is never returned and the executor
//! refuses all later work.

use kiln_config::ExecutorConfig;
use std::sync::mpsc;
use std::time::Duration;

/// Name of the compiler thread.
const THREAD_NAME: &str = "kiln-compiler";

/// Why a call did not complete.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The compiler thread could not be started.
    #[error("cannot spawn compiler thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The call ran past its deadline.
    #[error("compiler thread timed out after {0:?}")]
    Timeout(Duration),
    /// The work panicked.
    #[error("compiler thread panicked")]
    Panicked,
    /// An earlier call timed out or panicked and took the state with it.
    #[error("compiler instance is unusable after an earlier failure")]
    Unusable,
}

/// Runs closures over owned state, on the compiler thread or inline.
#[derive(Debug)]
pub struct Executor {
    use_thread: bool,
    stack_size: usize,
    timeout: Option<Duration>,
    broken: bool,
}

impl Executor {
    /// Creates an executor.
    pub fn new(use_thread: bool, stack_size: usize, timeout: Option<Duration>) -> Self {
        Self {
            use_thread,
            stack_size,
            timeout,
            broken: false,
        }
    }

    /// Creates an executor from the `[executor]` options.
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.use_compiler_thread,
            config.stack_size_bytes(),
            config.timeout(),
        )
    }

    /// Returns `false` once a call has timed out or panicked.
    pub fn is_usable(&self) -> bool {
        !self.broken
    }

    /// Runs `work` over `state` and hands both back.
    ///
    /// Inline execution ignores the timeout.
    pub fn run<T, R, W>(&mut self, state: T, work: W) -> Result<(T, R), ExecutorError>
    where
        T: Send + 'static,
        R: Send + 'static,
        W: FnOnce(&mut T) -> R + Send + 'static,
    {
        if self.broken {
            return Err(ExecutorError::Unusable);
        }
        if !self.use_thread {
            let mut state = state;
            let result = work(&mut state);
            return Ok((state, result));
        }

        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .stack_size(self.stack_size)
            .spawn(move || {
                let mut state = state;
                let result = work(&mut state);
                // The receiver is gone only after a timeout; nothing to do then.
                let _ = tx.send((state, result));
            })?;

        let received = match self.timeout {
            Some(limit) => match rx.recv_timeout(limit) {
                Ok(done) => Ok(done),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    self.broken = true;
                    tracing::warn!(?limit, "compiler thread timed out, abandoning instance");
                    return Err(ExecutorError::Timeout(limit));
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => Err(ExecutorError::Panicked),
            },
            None => rx.recv().map_err(|_| ExecutorError::Panicked),
        };
        let _ = handle.join();
        if received.is_err() {
            self.broken = true;
            tracing::warn!("compiler thread panicked, abandoning instance");
        }
        received
    }
}
