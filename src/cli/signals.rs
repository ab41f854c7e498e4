//! Signal handling for foreground recording
//!
//! The capture process runs in its own process group, so a terminal Ctrl+C
//! only reaches this process; it is turned into a stop request here.

use std::io;

use tokio::sync::mpsc;
use tracing::debug;

/// Signals that ask the recorder to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl StopRequest {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
        }
    }
}

/// Stop signal listener.
///
/// Once created, Ctrl+C no longer terminates the process; it is delivered
/// through `recv` instead.
pub struct StopSignal {
    receiver: mpsc::Receiver<StopRequest>,
}

impl StopSignal {
    /// Start listening for stop signals. Must be called inside a runtime.
    #[cfg(unix)]
    pub fn new() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let (tx, rx) = mpsc::channel(4);

        let tx_int = tx.clone();
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            while sigint.recv().await.is_some() {
                debug!("received SIGINT");
                if tx_int.send(StopRequest::Interrupt).await.is_err() {
                    break;
                }
            }
        });

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            while sigterm.recv().await.is_some() {
                debug!("received SIGTERM");
                if tx.send(StopRequest::Terminate).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self { receiver: rx })
    }

    /// Start listening for Ctrl+C. Must be called inside a runtime.
    #[cfg(not(unix))]
    pub fn new() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("received Ctrl+C");
                if tx.send(StopRequest::Interrupt).await.is_err() {
                    break;
                }
            }
        });
        Ok(Self { receiver: rx })
    }

    /// Wait for the next stop request
    pub async fn recv(&mut self) -> Option<StopRequest> {
        self.receiver.recv().await
    }
}
