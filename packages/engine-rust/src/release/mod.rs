//! Release engine: buffers correlated messages and emits them as
//! aggregated or resequenced output.
//!
//! One engine realizes both EIP shapes; the difference is the output
//! strategy. Aggregation combines a whole group into one message;
//! resequencing re-emits buffered members one at a time in ascending
//! sequence order. Both forward through a reply-channel router so every
//! released message reaches the destination it carries (or the configured
//! output channel).

mod combine;
mod expiry;
mod policy;

use std::sync::Arc;

use switchyard_core::{
    headers, CorrelationId, Message, MessageBuilder, MessageChannel, MessageGroup,
};

pub use combine::{Combiner, ConcatCombiner};
pub use expiry::{ExpiryConfig, ExpiryTask, ExpiryWorker};
pub use policy::{ReleasePolicy, SequenceContiguous, SizeComplete};

use crate::channel::{ChannelRegistry, NullChannel};
use crate::error::EngineError;
use crate::router::{MessageRouter, RouterConfig};
use crate::store::GroupStore;

// ---------------------------------------------------------------------------
// OutputStrategy
// ---------------------------------------------------------------------------

/// What a release does with the buffered members.
pub enum OutputStrategy {
    /// Combine the whole group into one message. Atomic: never partial.
    Aggregate { combiner: Arc<dyn Combiner> },
    /// Emit members one at a time, in ascending sequence order, each to its
    /// own `replyChannel`.
    Resequence,
}

// ---------------------------------------------------------------------------
// ReleaseEngine
// ---------------------------------------------------------------------------

/// Correlates inbound messages into groups and releases them per policy.
pub struct ReleaseEngine {
    store: Arc<dyn GroupStore>,
    policy: Arc<dyn ReleasePolicy>,
    strategy: OutputStrategy,
    output_router: MessageRouter,
    discard_channel: Arc<dyn MessageChannel>,
}

impl ReleaseEngine {
    /// Aggregating engine: size-complete policy, string-concatenating
    /// combiner. Output goes to the first member's `replyChannel`, falling
    /// back to `output_channel`.
    pub fn aggregator(
        store: Arc<dyn GroupStore>,
        registry: Option<Arc<ChannelRegistry>>,
        output_channel: Option<Arc<dyn MessageChannel>>,
    ) -> Self {
        Self {
            store,
            policy: Arc::new(SizeComplete),
            strategy: OutputStrategy::Aggregate {
                combiner: Arc::new(ConcatCombiner),
            },
            output_router: Self::output_router(registry, output_channel),
            discard_channel: Arc::new(NullChannel),
        }
    }

    /// Resequencing engine: sequence-contiguous policy. Members are emitted
    /// to their own `replyChannel`, falling back to `output_channel`.
    pub fn resequencer(
        store: Arc<dyn GroupStore>,
        registry: Option<Arc<ChannelRegistry>>,
        output_channel: Option<Arc<dyn MessageChannel>>,
        release_partial: bool,
    ) -> Self {
        Self {
            store,
            policy: Arc::new(SequenceContiguous { release_partial }),
            strategy: OutputStrategy::Resequence,
            output_router: Self::output_router(registry, output_channel),
            discard_channel: Arc::new(NullChannel),
        }
    }

    /// Replace the release policy (e.g. a custom closure).
    #[must_use]
    pub fn with_policy(mut self, policy: impl ReleasePolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Replace the combiner. Only meaningful for aggregating engines.
    #[must_use]
    pub fn with_combiner(mut self, combiner: impl Combiner + 'static) -> Self {
        if let OutputStrategy::Aggregate { combiner: slot } = &mut self.strategy {
            *slot = Arc::new(combiner);
        }
        self
    }

    /// Replace the discard destination (defaults to the null channel).
    #[must_use]
    pub fn with_discard_channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.discard_channel = channel;
        self
    }

    /// The backing correlation store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn GroupStore> {
        &self.store
    }

    fn output_router(
        registry: Option<Arc<ChannelRegistry>>,
        output_channel: Option<Arc<dyn MessageChannel>>,
    ) -> MessageRouter {
        MessageRouter::reply_channel(
            registry,
            RouterConfig {
                resolution_required: true,
                default_output_channel: output_channel,
            },
        )
    }

    /// Buffer one message and release its group if the policy allows.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingCorrelationKey`] when the message has no
    /// `correlationId`; combine and forwarding errors from the release
    /// itself.
    pub async fn handle(&self, message: Message) -> Result<(), EngineError> {
        let correlation_id = message
            .correlation_id()
            .cloned()
            .ok_or(EngineError::MissingCorrelationKey {
                message_id: message.id(),
            })?;

        loop {
            let slot = self.store.get_or_create(&correlation_id);
            let mut group = slot.lock().await;
            if group.is_closed() {
                // Released or expired between lookup and lock; the slot is
                // stale, fetch a fresh one.
                continue;
            }

            if !group.can_add(&message) {
                tracing::warn!(
                    correlation_id = %correlation_id,
                    message_id = %message.id(),
                    sequence = ?message.sequence_number(),
                    "duplicate or already-passed sequence position, discarding",
                );
                drop(group);
                let _ = self.discard_channel.send(message).await;
                return Ok(());
            }

            group.add(message);
            if self.policy.is_releasable(&group) {
                self.release(&mut group).await?;
                if self.group_is_finished(&group) {
                    group.close();
                    self.store.remove(&correlation_id);
                }
            } else {
                tracing::debug!(
                    correlation_id = %correlation_id,
                    buffered = group.size(),
                    "buffered, not yet releasable",
                );
            }
            return Ok(());
        }
    }

    /// Release whatever is buffered regardless of the policy, then drop the
    /// group. External schedulers (and the expiry worker) call this for
    /// groups that will never complete. Safe to race a concurrent
    /// [`Self::handle`]: both paths lock the same slot, so exactly one
    /// performs the release.
    ///
    /// Returns whether a non-empty group was released.
    ///
    /// # Errors
    ///
    /// Combine and forwarding errors; the group is still cleared so an
    /// expired group cannot linger.
    pub async fn force_release(&self, correlation_id: &CorrelationId) -> Result<bool, EngineError> {
        let Some(slot) = self.store.get(correlation_id) else {
            return Ok(false);
        };
        let mut group = slot.lock().await;
        if group.is_closed() || group.is_empty() {
            return Ok(false);
        }
        tracing::info!(correlation_id = %correlation_id, buffered = group.size(), "forced release");

        let result = match &self.strategy {
            OutputStrategy::Aggregate { combiner } => {
                self.release_aggregate(&mut group, combiner.as_ref()).await
            }
            OutputStrategy::Resequence => {
                let run = group.take_remaining_by_sequence();
                self.emit_sequenced(run).await
            }
        };

        group.close();
        self.store.remove(correlation_id);
        result.map(|()| true)
    }

    /// Send every buffered member to the discard channel and drop the
    /// group. Returns whether a non-empty group was discarded.
    pub async fn discard_group(&self, correlation_id: &CorrelationId) -> bool {
        let Some(slot) = self.store.get(correlation_id) else {
            return false;
        };
        let mut group = slot.lock().await;
        if group.is_closed() {
            return false;
        }
        let members = group.take_all();
        group.close();
        self.store.remove(correlation_id);
        drop(group);

        tracing::info!(correlation_id = %correlation_id, discarded = members.len(), "group discarded");
        for member in members {
            let _ = self.discard_channel.send(member).await;
        }
        true
    }

    // --- release internals (always under the group's lock) ---

    async fn release(&self, group: &mut MessageGroup) -> Result<(), EngineError> {
        match &self.strategy {
            OutputStrategy::Aggregate { combiner } => {
                self.release_aggregate(group, combiner.as_ref()).await
            }
            OutputStrategy::Resequence => {
                let run = group.take_contiguous_run();
                self.emit_sequenced(run).await
            }
        }
    }

    async fn release_aggregate(
        &self,
        group: &mut MessageGroup,
        combiner: &dyn Combiner,
    ) -> Result<(), EngineError> {
        // Combine before draining so a combiner failure leaves the group
        // buffered; once drained, a forwarding failure does not restore it
        // (re-aggregating the same members would duplicate output).
        let payload = combiner.combine(group.correlation_id(), group.messages())?;
        let members = group.take_all();
        let output = Self::aggregate_output(group.correlation_id(), &members, payload);
        self.output_router.dispatch(output).await?;
        Ok(())
    }

    fn aggregate_output(
        correlation_id: &CorrelationId,
        members: &[Message],
        payload: switchyard_core::Payload,
    ) -> Message {
        let mut builder =
            MessageBuilder::from_payload(payload).correlation_id(correlation_id.clone());
        if let Some(first) = members.first() {
            if let Some(address) = first.reply_channel() {
                builder = builder.header(headers::REPLY_CHANNEL, address.clone());
            }
            if let Some(address) = first.error_channel() {
                builder = builder.header(headers::ERROR_CHANNEL, address.clone());
            }
        }
        builder.build()
    }

    async fn emit_sequenced(&self, run: Vec<Message>) -> Result<(), EngineError> {
        let mut first_failure = None;
        for member in run {
            if let Err(err) = self.output_router.dispatch(member).await {
                // Keep emitting so later positions are not silently lost.
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }
        match first_failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn group_is_finished(&self, group: &MessageGroup) -> bool {
        match self.strategy {
            // A released aggregate is done; stragglers start a new group.
            OutputStrategy::Aggregate { .. } => group.is_empty(),
            // A partially released sequence keeps its cursor until every
            // declared member has been emitted.
            OutputStrategy::Resequence => group.is_empty() && group.is_complete(),
        }
    }
}
