//! Advisory status text for the controller.

use chrono::{DateTime, Local};
use tokio::sync::mpsc;

/// One human-readable status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    /// Local time the message was sent
    pub at: DateTime<Local>,
    /// Message text
    pub text: String,
}

/// Sending half of the status channel. Sending never blocks or fails.
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::UnboundedSender<StatusMessage>,
}

impl StatusSender {
    /// Log `text` and forward it to the controller.
    pub fn send(&self, text: impl Into<String>) {
        let message = StatusMessage {
            at: Local::now(),
            text: text.into(),
        };
        tracing::info!(status = %message.text);
        // Nobody listening is fine.
        let _ = self.tx.send(message);
    }
}

/// Connected sender and receiver pair.
pub fn status_channel() -> (StatusSender, mpsc::UnboundedReceiver<StatusMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StatusSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_after_receiver_dropped() {
        let (status, rx) = status_channel();
        drop(rx);
        status.send("still fine");
    }

    #[test]
    fn test_messages_arrive_in_order() {
        let (status, mut rx) = status_channel();
        status.send("one");
        status.send("two");
        assert_eq!(rx.try_recv().unwrap().text, "one");
        assert_eq!(rx.try_recv().unwrap().text, "two");
    }

    #[test]
    fn test_receiver_sees_close_after_last_sender() {
        let (status, mut rx) = status_channel();
        let worker_copy = status.clone();
        worker_copy.send("from worker");
        drop(worker_copy);
        drop(status);

        let first = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(first.text, "from worker");
        assert!(tokio_test::block_on(rx.recv()).is_none());
    }
}
