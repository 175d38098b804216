//! Delivery of scheduled messages.
//!
//! [`spawn_delivery`] drains [`ScheduledEvent`]s from the scheduler and
//! hands each one to a [`Messenger`]. The CLI has no chat transport, so
//! [`StdoutMessenger`] prints to the terminal.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use concierge_agent::{CollabResult, Messenger, ScheduledAction};
use concierge_intent::ScheduledEvent;

/// Prints outbound messages to stdout.
#[derive(Default)]
pub struct StdoutMessenger {
    sent: AtomicU64,
}

impl StdoutMessenger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Messenger for StdoutMessenger {
    async fn send(&self, destination: &str, text: &str) -> CollabResult<String> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        println!();
        println!("  📨 [to {destination}] {text}");
        Ok(format!("stdout-{n}"))
    }
}

/// Forward every scheduled event to `messenger` until the channel closes.
pub fn spawn_delivery(
    mut events: mpsc::UnboundedReceiver<ScheduledEvent>,
    messenger: Arc<dyn Messenger>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &event.action {
                ScheduledAction::SendMessage { destination, text } => {
                    match messenger.send(destination, text).await {
                        Ok(message_id) => {
                            info!(job_id = %event.job_id, %destination, %message_id, "scheduled message delivered")
                        }
                        Err(e) => {
                            warn!(job_id = %event.job_id, %destination, error = %e, "scheduled message not delivered")
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl Messenger for Outbox {
        async fn send(&self, destination: &str, text: &str) -> CollabResult<String> {
            let mut sent = self.0.lock().unwrap();
            sent.push((destination.to_string(), text.to_string()));
            Ok(sent.len().to_string())
        }
    }

    #[tokio::test]
    async fn events_reach_the_messenger() {
        let outbox = Arc::new(Outbox::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_delivery(rx, outbox.clone());

        tx.send(ScheduledEvent {
            job_id: "message-1".into(),
            action: ScheduledAction::SendMessage {
                destination: "42".into(),
                text: "Send the report".into(),
            },
            fired_at: Utc::now(),
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(
            outbox.0.lock().unwrap().as_slice(),
            [("42".to_string(), "Send the report".to_string())]
        );
    }

    #[tokio::test]
    async fn stdout_messenger_numbers_messages() {
        let messenger = StdoutMessenger::new();
        assert_eq!(messenger.send("me", "one").await.unwrap(), "stdout-1");
        assert_eq!(messenger.send("me", "two").await.unwrap(), "stdout-2");
    }
}
