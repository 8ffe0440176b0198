//! Domain events and the notification seam.
//!
//! Core operations emit events only after their transaction has committed.
//! Delivery is fire-and-forget: a failing [`Notifier`] is logged and ignored,
//! it can never undo a committed mutation.

use crate::entities::ReviewStatus;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events published to the notification collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// An account balance was debited or credited
    BalanceChanged {
        /// The account whose balance moved
        account_id: i64,
    },
    /// A purchase committed
    PurchaseCompleted {
        /// The new ledger entry
        ledger_entry_id: i64,
    },
    /// A refund committed; the entry no longer exists
    RefundApproved {
        /// The reversed (deleted) ledger entry
        ledger_entry_id: i64,
    },
    /// A return request was filed
    ReturnRequested {
        /// The new return request
        return_request_id: i64,
    },
    /// A balance request was filed
    DemandeSubmitted {
        /// The new demande
        demande_id: i64,
        /// Who asked
        requester_id: i64,
    },
    /// A balance request reached a terminal state
    DemandeDecided {
        /// The decided demande
        demande_id: i64,
        /// Approved or rejected
        status: ReviewStatus,
    },
}

/// Delivery failure reported by a [`Notifier`]
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The sink has shut down
    #[error("notification sink closed")]
    Closed,
    /// Any other delivery problem
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Sink for domain events.
pub trait Notifier: Send + Sync {
    /// Delivers one event. Must not block on slow consumers.
    fn notify(&self, event: &DomainEvent) -> Result<(), NotifyError>;
}

/// In-process fan-out over a tokio broadcast channel.
///
/// Consumers call [`ChannelNotifier::subscribe`]; publishing with no subscribers
/// is not an error.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: broadcast::Sender<DomainEvent>,
}

impl ChannelNotifier {
    /// Creates a notifier whose channel buffers `capacity` events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new receiver.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: &DomainEvent) -> Result<(), NotifyError> {
        match self.sender.send(event.clone()) {
            Ok(receivers) => debug!(receivers, ?event, "Published domain event"),
            Err(_) => debug!(?event, "No subscribers for domain event"),
        }
        Ok(())
    }
}

/// Writes events to the log as JSON and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &DomainEvent) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_string(event).map_err(|e| NotifyError::Delivery(e.to_string()))?;
        info!(%payload, "Domain event");
        Ok(())
    }
}

/// Delivers `event`, logging and discarding any failure.
pub fn emit(notifier: &dyn Notifier, event: DomainEvent) {
    if let Err(e) = notifier.notify(&event) {
        warn!(error = %e, ?event, "Notification delivery failed");
    }
}
