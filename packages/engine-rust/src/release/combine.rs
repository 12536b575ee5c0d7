//! Combiners: fold a released group into one output payload.

use std::sync::Arc;

use switchyard_core::{CorrelationId, Message, Payload};

use crate::error::EngineError;

/// Aggregation strategy: merge the group's members (arrival order) into a
/// single payload.
pub trait Combiner: Send + Sync {
    /// # Errors
    ///
    /// Returns [`EngineError::Uncombinable`] when the members cannot be
    /// merged by this combiner.
    fn combine(
        &self,
        correlation_id: &CorrelationId,
        members: &[Message],
    ) -> Result<Payload, EngineError>;
}

impl<F> Combiner for F
where
    F: Fn(&CorrelationId, &[Message]) -> Result<Payload, EngineError> + Send + Sync,
{
    fn combine(
        &self,
        correlation_id: &CorrelationId,
        members: &[Message],
    ) -> Result<Payload, EngineError> {
        self(correlation_id, members)
    }
}

/// Default combiner: concatenates `String` (or `&'static str`) payloads in
/// arrival order. Anything else needs a custom [`Combiner`].
pub struct ConcatCombiner;

impl Combiner for ConcatCombiner {
    fn combine(
        &self,
        correlation_id: &CorrelationId,
        members: &[Message],
    ) -> Result<Payload, EngineError> {
        let mut combined = String::new();
        for member in members {
            if let Some(text) = member.payload_as::<String>() {
                combined.push_str(text);
            } else if let Some(text) = member.payload_as::<&'static str>() {
                combined.push_str(text);
            } else {
                return Err(EngineError::Uncombinable {
                    correlation_id: correlation_id.clone(),
                    detail: format!("message {} has a non-string payload", member.id()),
                });
            }
        }
        Ok(Arc::new(combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_in_arrival_order() {
        let members = vec![
            Message::with_payload("123".to_string()),
            Message::with_payload("456".to_string()),
        ];
        let payload = ConcatCombiner.combine(&"x".into(), &members).unwrap();
        assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some("123456"));
    }

    #[test]
    fn non_string_payload_is_uncombinable() {
        let members = vec![Message::with_payload(5i64)];
        let err = ConcatCombiner.combine(&"x".into(), &members).unwrap_err();
        assert!(matches!(err, EngineError::Uncombinable { .. }));
    }

    #[test]
    fn closures_are_combiners() {
        let sum = |_: &CorrelationId, members: &[Message]| {
            let total: i64 = members.iter().filter_map(|m| m.payload_as::<i64>()).sum();
            Ok(Arc::new(total) as Payload)
        };
        let members = vec![Message::with_payload(2i64), Message::with_payload(3i64)];
        let payload = sum.combine(&"x".into(), &members).unwrap();
        assert_eq!(payload.downcast_ref::<i64>(), Some(&5));
    }
}
