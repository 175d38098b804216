//! Deferred messages: resolve a recipient and a time, then schedule a send.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::display_time;
use crate::base::{Agent, AgentRequest, excerpt};
use crate::collab::{PersistenceStore, ScheduledAction, ScheduledJob, Scheduler};
use crate::dates::parse_when;
use crate::error::Result;
use crate::slots::MessageSlots;
use crate::types::{Action, AgentOutcome, AgentType, Collection};

/// Words that mean "send it to me".
const SELF_WORDS: [&str; 7] = ["мне", "себе", "я", "me", "myself", "self", "i"];
const PREVIEW_CHARS: usize = 100;

pub struct MessageAgent {
    store: Arc<dyn PersistenceStore>,
    scheduler: Arc<dyn Scheduler>,
}

/// A resolved delivery target.
#[derive(Debug, Clone, PartialEq)]
struct Recipient {
    label: String,
    destination: String,
}

impl MessageAgent {
    pub fn new(store: Arc<dyn PersistenceStore>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Self words go to the sender, numeric ids are used as-is, anything
    /// else is looked up as a contact. Unresolved references fall back to
    /// the sender.
    async fn resolve_recipient(&self, reference: Option<&str>, sender: Option<&str>) -> Option<Recipient> {
        let to_sender = || {
            sender.map(|s| Recipient {
                label: "you".into(),
                destination: s.to_string(),
            })
        };

        let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
            return to_sender();
        };
        if SELF_WORDS.contains(&reference.to_lowercase().as_str()) {
            return to_sender();
        }
        if is_numeric_id(reference) {
            return Some(Recipient {
                label: reference.to_string(),
                destination: reference.to_string(),
            });
        }

        match self.store.find_contact(reference).await {
            Ok(Some(contact)) => Some(Recipient {
                label: contact.name,
                destination: contact.destination,
            }),
            Ok(None) => {
                warn!(recipient = %reference, "unknown recipient, sending to the requester");
                to_sender()
            }
            Err(e) => {
                warn!(recipient = %reference, error = %e, "contact lookup failed, sending to the requester");
                to_sender()
            }
        }
    }
}

#[async_trait]
impl Agent for MessageAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Message
    }

    fn context_collections(&self) -> &'static [Collection] {
        &[]
    }

    async fn process_with_context(&self, request: &AgentRequest) -> Result<AgentOutcome> {
        let slots = MessageSlots::from_map(&request.classification.extracted_data);
        let text = slots.text.clone().unwrap_or_else(|| request.input.clone());

        let Some(recipient) = self
            .resolve_recipient(slots.recipient.as_deref(), request.sender.as_deref())
            .await
        else {
            return Ok(AgentOutcome::new(
                "The message was not scheduled: no recipient could be determined.",
            )
            .with_metadata("scheduled", false)
            .without_indexing());
        };

        let now = Utc::now();
        let send_at = resolve_send_time(slots.send_time.as_deref(), &request.input, now);

        let job_id = format!("message-{}", Uuid::now_v7());
        self.scheduler
            .schedule(ScheduledJob {
                id: job_id.clone(),
                execute_at: send_at,
                action: ScheduledAction::SendMessage {
                    destination: recipient.destination.clone(),
                    text: text.clone(),
                },
                repeat_interval: None,
            })
            .await?;
        info!(job_id = %job_id, send_at = %send_at, "message scheduled");

        let response = format!(
            "📨 Message to {} scheduled for {}:\n{}",
            recipient.label,
            display_time(send_at),
            excerpt(&text, PREVIEW_CHARS),
        );
        Ok(AgentOutcome::new(response)
            .with_action(
                Action::new("message_scheduled")
                    .with("job_id", job_id.as_str())
                    .with("destination", recipient.destination.as_str())
                    .with("send_at", send_at.to_rfc3339()),
            )
            .with_metadata("scheduled", true)
            .with_metadata("job_id", job_id)
            .with_metadata("recipient", recipient.label)
            .with_metadata("destination", recipient.destination)
            .with_metadata("send_at", send_at.to_rfc3339())
            .with_metadata("message", text))
    }
}

/// Slot first, then the raw input; unparseable or past times become one
/// hour from now.
fn resolve_send_time(slot: Option<&str>, input: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = slot
        .and_then(|s| parse_when(s, now))
        .or_else(|| parse_when(input, now));
    match parsed {
        Some(t) if t > now => t,
        _ => now + Duration::hours(1),
    }
}

fn is_numeric_id(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}
