//! The immutable message envelope and its builder.

use std::any::Any;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::channel::MessageChannel;
use crate::headers::{
    self, ChannelAddress, CorrelationId, HeaderValue,
};

/// Dynamically typed message payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Immutable envelope: a payload plus string-keyed headers.
///
/// The id is assigned at creation and never mutated. "Modifying" a message
/// means building a new one via [`MessageBuilder::from_message`], which
/// copies the payload and headers and assigns a fresh id.
#[derive(Clone)]
pub struct Message {
    id: Uuid,
    payload: Payload,
    headers: HashMap<String, HeaderValue>,
}

impl Message {
    /// Start building a message around a payload.
    pub fn builder(payload: impl Any + Send + Sync) -> MessageBuilder {
        MessageBuilder::new(payload)
    }

    /// Build a plain message with no headers beyond the id.
    pub fn with_payload(payload: impl Any + Send + Sync) -> Self {
        MessageBuilder::new(payload).build()
    }

    /// Build an error message: an [`ErrorPayload`] wrapping `error`, with
    /// the message that caused the failure attached when available.
    pub fn error_message(
        error: Box<dyn StdError + Send + Sync>,
        failed_message: Option<Message>,
    ) -> Self {
        MessageBuilder::new(ErrorPayload {
            error,
            failed_message,
        })
        .build()
    }

    /// Unique id, assigned at creation.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The raw payload handle.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Downcast the payload to a concrete type.
    #[must_use]
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// All headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, HeaderValue> {
        &self.headers
    }

    /// A single header by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// The `correlationId` header.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.header(headers::CORRELATION_ID)?.as_correlation()
    }

    /// The `sequenceNumber` header (1-based position within a sequence).
    #[must_use]
    pub fn sequence_number(&self) -> Option<u32> {
        let n = self.header(headers::SEQUENCE_NUMBER)?.as_number()?;
        u32::try_from(n).ok().filter(|n| *n >= 1)
    }

    /// The `sequenceSize` header. `None` when absent or 0 (unknown size).
    #[must_use]
    pub fn sequence_size(&self) -> Option<u32> {
        let n = self.header(headers::SEQUENCE_SIZE)?.as_number()?;
        u32::try_from(n).ok().filter(|n| *n >= 1)
    }

    /// The `replyChannel` header.
    #[must_use]
    pub fn reply_channel(&self) -> Option<&ChannelAddress> {
        self.header(headers::REPLY_CHANNEL)?.as_channel()
    }

    /// The `errorChannel` header.
    #[must_use]
    pub fn error_channel(&self) -> Option<&ChannelAddress> {
        self.header(headers::ERROR_CHANNEL)?.as_channel()
    }

    /// Whether the payload is an [`ErrorPayload`].
    #[must_use]
    pub fn is_error_message(&self) -> bool {
        self.payload_as::<ErrorPayload>().is_some()
    }
}

impl fmt::Debug for Message {
    /// The payload is type-erased and may be large, so `Debug` leaves it out.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// MessageBuilder
// ---------------------------------------------------------------------------

/// Builder for [`Message`]. Every `build()` assigns a fresh id, including
/// builds seeded from an existing message.
pub struct MessageBuilder {
    payload: Payload,
    headers: HashMap<String, HeaderValue>,
}

impl MessageBuilder {
    /// Start from a payload with empty headers.
    pub fn new(payload: impl Any + Send + Sync) -> Self {
        Self {
            payload: Arc::new(payload),
            headers: HashMap::new(),
        }
    }

    /// Start from an already type-erased payload (e.g. a combiner's
    /// output), avoiding a second layer of `Arc`.
    #[must_use]
    pub fn from_payload(payload: Payload) -> Self {
        Self {
            payload,
            headers: HashMap::new(),
        }
    }

    /// Start from an existing message, copying its payload and headers.
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        Self {
            payload: Arc::clone(&message.payload),
            headers: message.headers.clone(),
        }
    }

    /// Replace the payload, keeping accumulated headers.
    #[must_use]
    pub fn payload(mut self, payload: impl Any + Send + Sync) -> Self {
        self.payload = Arc::new(payload);
        self
    }

    /// Set an arbitrary header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the `correlationId` header.
    #[must_use]
    pub fn correlation_id(self, id: impl Into<CorrelationId>) -> Self {
        self.header(headers::CORRELATION_ID, HeaderValue::Correlation(id.into()))
    }

    /// Set the `sequenceNumber` header (1-based).
    #[must_use]
    pub fn sequence_number(self, number: u32) -> Self {
        self.header(headers::SEQUENCE_NUMBER, i64::from(number))
    }

    /// Set the `sequenceSize` header.
    #[must_use]
    pub fn sequence_size(self, size: u32) -> Self {
        self.header(headers::SEQUENCE_SIZE, i64::from(size))
    }

    /// Set the `replyChannel` header to a registry name.
    #[must_use]
    pub fn reply_channel_name(self, name: impl Into<String>) -> Self {
        self.header(headers::REPLY_CHANNEL, ChannelAddress::name(name))
    }

    /// Set the `replyChannel` header to a direct channel handle.
    #[must_use]
    pub fn reply_channel(self, channel: Arc<dyn MessageChannel>) -> Self {
        self.header(headers::REPLY_CHANNEL, ChannelAddress::instance(channel))
    }

    /// Set the `errorChannel` header to a registry name.
    #[must_use]
    pub fn error_channel_name(self, name: impl Into<String>) -> Self {
        self.header(headers::ERROR_CHANNEL, ChannelAddress::name(name))
    }

    /// Set the `errorChannel` header to a direct channel handle.
    #[must_use]
    pub fn error_channel(self, channel: Arc<dyn MessageChannel>) -> Self {
        self.header(headers::ERROR_CHANNEL, ChannelAddress::instance(channel))
    }

    /// Finish, assigning a fresh id.
    #[must_use]
    pub fn build(self) -> Message {
        Message {
            id: Uuid::new_v4(),
            payload: self.payload,
            headers: self.headers,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorPayload
// ---------------------------------------------------------------------------

/// Payload of an error message: the failure itself, plus the message whose
/// handling produced it when that is known.
///
/// Routers and gateways detect error messages by downcasting to this type,
/// and the error-type router walks `error`'s `source()` chain.
pub struct ErrorPayload {
    pub error: Box<dyn StdError + Send + Sync>,
    pub failed_message: Option<Message>,
}

impl ErrorPayload {
    /// Wrap a failure with no originating message.
    pub fn new(error: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            error: Box::new(error),
            failed_message: None,
        }
    }

    /// The outermost error.
    #[must_use]
    pub fn error(&self) -> &(dyn StdError + 'static) {
        &*self.error
    }
}

impl fmt::Debug for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorPayload")
            .field("error", &self.error)
            .field(
                "failed_message",
                &self.failed_message.as_ref().map(Message::id),
            )
            .finish()
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_assigns_unique_ids() {
        let a = Message::with_payload("one".to_string());
        let b = Message::with_payload("one".to_string());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn from_message_copies_headers_but_not_id() {
        let original = Message::builder("body".to_string())
            .correlation_id("group-1")
            .sequence_number(2)
            .sequence_size(5)
            .build();

        let copy = MessageBuilder::from_message(&original).build();

        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.correlation_id(), original.correlation_id());
        assert_eq!(copy.sequence_number(), Some(2));
        assert_eq!(copy.sequence_size(), Some(5));
        assert_eq!(copy.payload_as::<String>().map(String::as_str), Some("body"));
    }

    #[test]
    fn sequence_size_zero_means_unknown() {
        let msg = Message::builder(()).sequence_size(0).build();
        assert_eq!(msg.sequence_size(), None);
    }

    #[test]
    fn sequence_number_must_be_positive() {
        let msg = Message::builder(())
            .header(headers::SEQUENCE_NUMBER, 0i64)
            .build();
        assert_eq!(msg.sequence_number(), None);
    }

    #[test]
    fn error_message_wraps_cause_and_failed_message() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        let failed = Message::with_payload(1i64);
        let failed_id = failed.id();
        let err = Message::error_message(Box::new(Boom), Some(failed));

        assert!(err.is_error_message());
        let payload = err.payload_as::<ErrorPayload>().unwrap();
        assert_eq!(payload.error().to_string(), "boom");
        assert_eq!(payload.failed_message.as_ref().map(Message::id), Some(failed_id));
    }
}
