use tokio::sync::broadcast;

use crate::model::LedgerInfo;

const CHANNEL_CAPACITY: usize = 256;

/// Severity of a transient notice. None of these are fatal to the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// Signals the UI layer subscribes to. The engine never renders; it only
/// announces that something worth re-reading happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// The 9-week grid was rebuilt; re-read the window snapshot.
    GridRebuilt,
    /// A non-silent fetch started/finished (drives the loading indicator).
    Loading(bool),
    /// Transient toast-style notice.
    Notice(NoticeKind, String),
    /// Updated balance/overdraft from a reservation mutation, forwarded
    /// verbatim from the ledger collaborator.
    Ledger(LedgerInfo),
}

/// Single broadcast channel for engine → UI signals.
pub struct SignalHub {
    sender: broadcast::Sender<Signal>,
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }

    /// Send a signal. No-op if nobody is listening.
    pub fn send(&self, signal: Signal) {
        let _ = self.sender.send(signal);
    }

    pub fn notice(&self, kind: NoticeKind, text: impl Into<String>) {
        self.send(Signal::Notice(kind, text.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = SignalHub::new();
        let mut rx = hub.subscribe();
        hub.send(Signal::GridRebuilt);
        assert_eq!(rx.recv().await.unwrap(), Signal::GridRebuilt);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = SignalHub::new();
        // No subscriber — should not panic
        hub.notice(NoticeKind::Error, "network timeout");
    }

    #[tokio::test]
    async fn notices_carry_kind_and_text() {
        let hub = SignalHub::new();
        let mut rx = hub.subscribe();
        hub.notice(NoticeKind::Warning, "sold out");
        match rx.recv().await.unwrap() {
            Signal::Notice(kind, text) => {
                assert_eq!(kind, NoticeKind::Warning);
                assert_eq!(text, "sold out");
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }
}
