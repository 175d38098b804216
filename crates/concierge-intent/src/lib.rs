//! Intent classification and routing for the concierge assistant.
//!
//! This crate provides:
//!
//! - **Classification**: free text to one of six agent types through the
//!   language model via [`classifier::Classifier`]. Never fails.
//! - **Routing**: registry lookup, fallback to the default agent, follow-up
//!   chains and a [`trace::DecisionTrace`] per message via
//!   [`router::AgentRouter`].
//! - **Scheduling**: deferred message delivery via
//!   [`scheduler::MessageScheduler`].

pub mod classifier;
pub mod error;
pub mod router;
pub mod scheduler;
pub mod trace;

pub use classifier::{Classifier, parse_classification};
pub use error::{IntentError, Result};
pub use router::{AgentRegistry, AgentRouter, RouterConfig};
pub use scheduler::{MessageScheduler, ScheduledEvent};
pub use trace::{DecisionTrace, FailedChainStep};
