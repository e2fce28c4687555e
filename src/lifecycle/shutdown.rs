//! Termination signals

use std::io;

use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

/// SIGTERM and SIGINT listeners, installed once at bring-up
pub struct ShutdownSignal {
    terminate: Signal,
    interrupt: Signal,
}

impl ShutdownSignal {
    /// Register both listeners. Must be called inside the runtime.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Resolves on the first termination signal and names it
    pub async fn recv(&mut self) -> &'static str {
        let name = tokio::select! {
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
        };
        debug!(signal = name, "termination signal");
        name
    }
}
