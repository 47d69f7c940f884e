//! Routing of operator interrupts.
//!
//! Ctrl-C means two different things depending on where the daemon is:
//! while the operator is being asked to acknowledge an alarm it only
//! interrupts that wait; anywhere else it shuts the daemon down.
//! Termination signals (`SIGTERM`, `SIGQUIT`) always shut down.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where an interrupt ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptRoute {
    /// An acknowledgment wait was listening and received it.
    Wait,
    /// Nobody was listening; the shutdown token was cancelled.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct Interrupts {
    waits: broadcast::Sender<()>,
    shutdown: CancellationToken,
}

impl Interrupts {
    pub fn new(shutdown: CancellationToken) -> Self {
        let (waits, _) = broadcast::channel(4);
        Self { waits, shutdown }
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Deliver one operator interrupt.
    pub fn interrupt(&self) -> InterruptRoute {
        if self.has_listener() && self.waits.send(()).is_ok() {
            InterruptRoute::Wait
        } else {
            self.shutdown.cancel();
            InterruptRoute::Shutdown
        }
    }

    /// Whether an acknowledgment wait currently claims interrupts.
    pub fn has_listener(&self) -> bool {
        self.waits.receiver_count() > 0
    }

    /// Request a full shutdown regardless of any active wait.
    pub fn terminate(&self) {
        self.shutdown.cancel();
    }

    /// Claim interrupts for the lifetime of the returned listener.
    pub fn listen(&self) -> InterruptListener {
        InterruptListener {
            rx: self.waits.subscribe(),
        }
    }
}

pub struct InterruptListener {
    rx: broadcast::Receiver<()>,
}

impl InterruptListener {
    /// Resolves on the next interrupt delivered to this listener.
    pub async fn recv(&mut self) {
        match self.rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
        }
    }
}

/// Forward process signals into `interrupts` until shutdown.
pub fn spawn_signal_listener(interrupts: Interrupts) -> std::io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigquit = signal(SignalKind::quit())?;

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interrupts.shutdown.cancelled() => break,
                    _ = sigint.recv() => route(&interrupts),
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                        interrupts.terminate();
                    }
                    _ = sigquit.recv() => {
                        info!("Received SIGQUIT, shutting down");
                        interrupts.terminate();
                    }
                }
            }
            debug!("Signal listener stopped");
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interrupts.shutdown.cancelled() => break,
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => route(&interrupts),
                        Err(e) => {
                            warn!(error = %e, "Ctrl-C handler failed, shutting down");
                            interrupts.terminate();
                        }
                    },
                }
            }
            debug!("Signal listener stopped");
        }))
    }
}

fn route(interrupts: &Interrupts) {
    match interrupts.interrupt() {
        InterruptRoute::Wait => debug!("Interrupt delivered to acknowledgment wait"),
        InterruptRoute::Shutdown => warn!("Interrupted, shutting down"),
    }
}
