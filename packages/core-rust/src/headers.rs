//! Header names and header value types for the message envelope.
//!
//! Headers are an open string-keyed map, but a handful of names are reserved
//! for the routing/correlation machinery. Those reserved headers get typed
//! accessors on [`Message`](crate::Message) so callers never pattern-match
//! on [`HeaderValue`] directly.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::channel::MessageChannel;

// ---------------------------------------------------------------------------
// Reserved header names
// ---------------------------------------------------------------------------

/// Groups related messages (e.g. split results of one original message).
pub const CORRELATION_ID: &str = "correlationId";
/// 1-based position of a message within an ordered group.
pub const SEQUENCE_NUMBER: &str = "sequenceNumber";
/// Total number of messages in the group. 0 or absent means "unknown size".
pub const SEQUENCE_SIZE: &str = "sequenceSize";
/// Destination for the reply produced while handling this message.
pub const REPLY_CHANNEL: &str = "replyChannel";
/// Destination for errors raised while handling this message.
pub const ERROR_CHANNEL: &str = "errorChannel";

// ---------------------------------------------------------------------------
// CorrelationId
// ---------------------------------------------------------------------------

/// Application-assigned key used to group related messages.
///
/// Any comparable value qualifies; the closed set of variants keeps the key
/// hashable so it can index the correlation store directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationId {
    Text(String),
    Number(i64),
    Id(Uuid),
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CorrelationId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(value: Uuid) -> Self {
        Self::Id(value)
    }
}

// ---------------------------------------------------------------------------
// ChannelAddress
// ---------------------------------------------------------------------------

/// A destination reference carried in a header: either a registry name to be
/// resolved later, or a direct handle that bypasses name lookup entirely.
#[derive(Clone)]
pub enum ChannelAddress {
    Name(String),
    Instance(Arc<dyn MessageChannel>),
}

impl ChannelAddress {
    /// Wrap a channel handle.
    pub fn instance(channel: Arc<dyn MessageChannel>) -> Self {
        Self::Instance(channel)
    }

    /// Wrap a registry name.
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl fmt::Debug for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "ChannelAddress::Name({name:?})"),
            Self::Instance(ch) => write!(f, "ChannelAddress::Instance({:?})", ch.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// HeaderValue
// ---------------------------------------------------------------------------

/// A single header entry.
///
/// `Opaque` carries arbitrary application data; the other variants exist so
/// the reserved headers stay strongly typed without downcasting.
#[derive(Clone)]
pub enum HeaderValue {
    Text(String),
    Number(i64),
    Correlation(CorrelationId),
    Channel(ChannelAddress),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl HeaderValue {
    /// Returns the text value, if this entry is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value, if this entry is a number.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the correlation key, if this entry is one.
    pub fn as_correlation(&self) -> Option<&CorrelationId> {
        match self {
            Self::Correlation(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the channel address, if this entry is one.
    pub fn as_channel(&self) -> Option<&ChannelAddress> {
        match self {
            Self::Channel(addr) => Some(addr),
            _ => None,
        }
    }
}

impl fmt::Debug for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "Text({s:?})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::Correlation(id) => write!(f, "Correlation({id})"),
            Self::Channel(addr) => write!(f, "{addr:?}"),
            Self::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<CorrelationId> for HeaderValue {
    fn from(value: CorrelationId) -> Self {
        Self::Correlation(value)
    }
}

impl From<ChannelAddress> for HeaderValue {
    fn from(value: ChannelAddress) -> Self {
        Self::Channel(value)
    }
}
