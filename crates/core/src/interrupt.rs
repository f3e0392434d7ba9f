//! Interrupt coordinator
//!
//! A background listener latches the first termination signal it sees. The
//! goto loop polls the latch between steps and stops before starting another
//! one; a step already in flight always runs to completion.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{MigrateError, MigrateResult};

const NO_SIGNAL: u8 = 0;

/// A termination signal the coordinator reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Interrupt => "interrupt",
            Signal::Terminate => "terminated",
        }
    }

    fn code(self) -> u8 {
        match self {
            Signal::Interrupt => 1,
            Signal::Terminate => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Signal::Interrupt),
            2 => Some(Signal::Terminate),
            _ => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct InterruptDetector {
    latch: Arc<AtomicU8>,
    shutdown: Option<oneshot::Sender<()>>,
    listener: Option<JoinHandle<()>>,
    forwarder: Option<JoinHandle<()>>,
}

impl InterruptDetector {
    /// Start listening for SIGINT and (on unix) SIGTERM.
    ///
    /// Must be called from within a tokio runtime.
    pub fn listen() -> MigrateResult<Self> {
        let (tx, rx) = mpsc::channel(1);

        #[cfg(unix)]
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        let forwarder = tokio::spawn(async move {
            #[cfg(unix)]
            let terminate = sigterm.recv();
            #[cfg(not(unix))]
            let terminate = std::future::pending::<Option<()>>();

            let signal = tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => Signal::Interrupt,
                    Err(err) => {
                        tracing::warn!(error = %err, "unable to listen for ctrl-c");
                        return;
                    }
                },
                _ = terminate => Signal::Terminate,
            };
            let _ = tx.send(signal).await;
        });

        let mut detector = Self::with_receiver(rx);
        detector.forwarder = Some(forwarder);
        Ok(detector)
    }

    /// Latch the first signal delivered on `signals`.
    pub fn with_receiver(mut signals: mpsc::Receiver<Signal>) -> Self {
        let latch = Arc::new(AtomicU8::new(NO_SIGNAL));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let listener_latch = Arc::clone(&latch);
        let listener = tokio::spawn(async move {
            tokio::select! {
                biased;
                Some(signal) = signals.recv() => {
                    // Only the first signal is kept.
                    let _ = listener_latch.compare_exchange(
                        NO_SIGNAL,
                        signal.code(),
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    );
                    tracing::warn!(signal = %signal, "received termination signal");
                }
                _ = &mut shutdown_rx => {}
            }
        });

        Self {
            latch,
            shutdown: Some(shutdown_tx),
            listener: Some(listener),
            forwarder: None,
        }
    }

    /// The latched signal, if any.
    pub fn signal(&self) -> Option<Signal> {
        Signal::from_code(self.latch.load(Ordering::SeqCst))
    }

    pub fn is_interrupted(&self) -> bool {
        self.signal().is_some()
    }

    /// `Err(Interrupted)` once a signal has been latched.
    pub fn check(&self) -> MigrateResult<()> {
        match self.signal() {
            Some(signal) => Err(MigrateError::Interrupted {
                signal: signal.as_str(),
            }),
            None => Ok(()),
        }
    }

    /// Stop listening and wait for the listener to finish.
    ///
    /// A signal already queued is still latched; the latch keeps its value.
    pub async fn shutdown(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
    }
}

impl Drop for InterruptDetector {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl fmt::Debug for InterruptDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptDetector")
            .field("signal", &self.signal())
            .field("listening", &self.listener.is_some())
            .finish()
    }
}
