//! Error types for routing, correlation, configuration, and gateway exchanges.

use std::time::Duration;

use switchyard_core::{CorrelationId, DeliveryError, Message};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while routing a message.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Resolution produced no destination and `resolution_required` is set.
    #[error("no destination resolved for message {message_id}")]
    DestinationResolution { message_id: Uuid },
    /// A channel name could not be found in the registry.
    #[error("no channel registered under '{name}'")]
    UnknownChannel { name: String },
    /// One or more sends failed during fan-out. Every destination was still
    /// attempted; `failures` reports each one individually.
    #[error("delivery failed for {} of {attempted} destinations", failures.len())]
    Delivery {
        attempted: usize,
        failures: Vec<DeliveryError>,
    },
}

/// Mutually exclusive or incomplete options detected at construction time.
///
/// Never raised at message-handling time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("recipient list cannot be configured with both channel instances and channel names")]
    RecipientListConflict,
    #[error("recipient list requires at least one channel or channel name")]
    RecipientListEmpty,
    #[error("recipient list names a channel '{name}' that is not registered")]
    UnknownRecipient { name: String },
}

/// Errors raised by the release engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The message carries no `correlationId` header. Caller-visible, not
    /// retried.
    #[error("message {message_id} has no correlationId header")]
    MissingCorrelationKey { message_id: Uuid },
    /// The configured combiner could not merge the group's payloads.
    #[error("cannot combine payloads of group '{correlation_id}': {detail}")]
    Uncombinable {
        correlation_id: CorrelationId,
        detail: String,
    },
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Errors surfaced to the caller of a gateway exchange.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No reply arrived within the deadline and `error_on_timeout` is set.
    #[error("no reply within {timeout:?}")]
    Timeout { timeout: Duration },
    /// The request could not be sent.
    #[error("request send failed")]
    Send(#[source] DeliveryError),
    /// An error message arrived instead of a reply. The reply message is
    /// kept so the original cause is not lost.
    #[error("received error reply: {detail}")]
    ErrorReply { detail: String, reply: Message },
    /// The reply path was dropped before a reply could arrive.
    #[error("reply path closed before a reply arrived")]
    ReplyPathClosed,
}
