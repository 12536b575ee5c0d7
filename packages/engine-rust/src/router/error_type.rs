//! Root-cause routing for error messages.
//!
//! Walks an error's `source()` chain from the outermost failure down to the
//! root cause, checking an exact-type mapping at every level. The last
//! match seen wins, so the deepest mapped cause decides the destination.

use std::any::type_name;
use std::error::Error as StdError;
use std::sync::Arc;

use switchyard_core::{ErrorPayload, Message, MessageChannel};

use super::{ChannelResolver, Resolution};

type Matcher = fn(&(dyn StdError + 'static)) -> bool;

fn is_exact<E: StdError + 'static>(err: &(dyn StdError + 'static)) -> bool {
    err.is::<E>()
}

struct ErrorMapping {
    matches: Matcher,
    type_name: &'static str,
    channel: Arc<dyn MessageChannel>,
}

/// Resolves error messages by the most specific mapped cause.
///
/// Only exact concrete types qualify — a mapping for one error type never
/// catches its wrappers or variants. Messages whose payload is not an
/// [`ErrorPayload`], and chains with no mapped class, resolve to the
/// unmatched-wrapper channel when one is set, otherwise to nothing (the
/// router policy then applies its default/drop/fail rules).
#[derive(Default)]
pub struct ErrorTypeResolver {
    mappings: Vec<ErrorMapping>,
    wrapper_channel: Option<Arc<dyn MessageChannel>>,
}

impl ErrorTypeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route errors whose cause chain contains an `E` to `channel`.
    #[must_use]
    pub fn map_cause<E: StdError + 'static>(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.mappings.push(ErrorMapping {
            matches: is_exact::<E>,
            type_name: type_name::<E>(),
            channel,
        });
        self
    }

    /// Route error messages whose chain matched nothing to `channel`
    /// (keyed on the error-message wrapper itself rather than a cause).
    #[must_use]
    pub fn unmatched_wrapper_channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.wrapper_channel = Some(channel);
        self
    }
}

impl ChannelResolver for ErrorTypeResolver {
    fn resolve(&self, message: &Message) -> Resolution {
        let Some(payload) = message.payload_as::<ErrorPayload>() else {
            tracing::warn!(
                message_id = %message.id(),
                "error-type router received a non-error message",
            );
            return Resolution::none();
        };

        // Outermost to root; remember the most recent (deepest) match.
        let mut selected: Option<&ErrorMapping> = None;
        let mut current: Option<&(dyn StdError + 'static)> = Some(payload.error());
        while let Some(err) = current {
            if let Some(mapping) = self.mappings.iter().find(|m| (m.matches)(err)) {
                tracing::debug!(
                    message_id = %message.id(),
                    cause = mapping.type_name,
                    "cause matched",
                );
                selected = Some(mapping);
            }
            current = err.source();
        }

        match selected {
            Some(mapping) => Resolution::Channels(vec![Arc::clone(&mapping.channel)]),
            None => self.wrapper_channel.as_ref().map_or_else(Resolution::none, |ch| {
                Resolution::Channels(vec![Arc::clone(ch)])
            }),
        }
    }
}
