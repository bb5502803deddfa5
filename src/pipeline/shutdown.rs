use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop flag checked by stage loops between items.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// A signal that is never triggered unless [`ShutdownSignal::trigger`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal triggered by Ctrl-C. Must be called inside a Tokio runtime.
    pub fn install() -> Self {
        let signal = Self::new();
        let listener = signal.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("Interrupt received; finishing the current item");
                    listener.trigger();
                }
                Err(err) => tracing::warn!(error = %err, "Failed to listen for Ctrl-C"),
            }
        });
        signal
    }

    /// Request a stop.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_triggered());
        signal.trigger();
        assert!(clone.is_triggered());
    }
}
