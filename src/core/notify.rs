//! # Readiness notification.
//!
//! Once every unit is healthy, the orchestrator calls
//! [`ReadyNotifier::notify_ready`] exactly once per `run`.
//!
//! - [`NoopNotifier`] - default; does nothing.
//! - [`SystemdNotifier`] - sends `READY=1` to the service manager (`$NOTIFY_SOCKET`).
//! - any `Fn()` closure.

/// Receives the "all modules healthy" signal.
pub trait ReadyNotifier: Send + Sync + 'static {
    /// Called once, after the health barrier succeeds.
    fn notify_ready(&self);
}

impl<F> ReadyNotifier for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn notify_ready(&self) {
        self()
    }
}

/// Notifier that ignores readiness.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ReadyNotifier for NoopNotifier {
    fn notify_ready(&self) {}
}

/// systemd notifier speaking the `sd_notify` protocol.
///
/// Does nothing outside a systemd unit (no `$NOTIFY_SOCKET`) and on non-Linux
/// targets. Send failures are logged and otherwise ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemdNotifier;

impl SystemdNotifier {
    /// Creates the notifier; the socket is read from the environment on each call.
    pub fn from_env() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
impl ReadyNotifier for SystemdNotifier {
    fn notify_ready(&self) {
        use sd_notify::{NotifyState, notify};

        if std::env::var_os("NOTIFY_SOCKET").is_none() {
            tracing::debug!("not running under systemd; skipping readiness notification");
            return;
        }
        if let Err(err) = notify(false, &[NotifyState::Ready]) {
            tracing::warn!(%err, "systemd readiness notification failed");
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl ReadyNotifier for SystemdNotifier {
    fn notify_ready(&self) {
        tracing::debug!("systemd notification unsupported on this platform");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_closure_notifier() {
        let hits = Arc::new(AtomicUsize::new(0));
        let n = {
            let hits = Arc::clone(&hits);
            move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        };
        n.notify_ready();
        n.notify_ready();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_notifiers_as_trait_objects() {
        let notifiers: Vec<Arc<dyn ReadyNotifier>> =
            vec![Arc::new(NoopNotifier), Arc::new(SystemdNotifier::from_env())];
        for n in notifiers {
            n.notify_ready();
        }
    }
}
