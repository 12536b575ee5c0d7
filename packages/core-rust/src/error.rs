//! Delivery errors shared by every channel implementation.

use thiserror::Error;

/// A send to a resolved channel did not succeed.
///
/// Each variant names the channel so fan-out callers can report failures
/// per destination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The channel's bounded buffer is full.
    #[error("channel '{0}' buffer is full")]
    Full(String),
    /// The receiving side is gone; nothing will ever drain this channel.
    #[error("channel '{0}' is closed")]
    Closed(String),
    /// A single-use reply slot was sent to twice.
    #[error("reply slot '{0}' already consumed")]
    AlreadyConsumed(String),
}

impl DeliveryError {
    /// Name of the channel the delivery failed on.
    #[must_use]
    pub fn channel_name(&self) -> &str {
        match self {
            Self::Full(name) | Self::Closed(name) | Self::AlreadyConsumed(name) => name,
        }
    }
}
