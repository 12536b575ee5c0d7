//! Message groups: the unit of correlation.
//!
//! A group buffers every unreleased member of one correlation id in arrival
//! order. Sequence-aware operations (`take_contiguous_run`,
//! `take_remaining_by_sequence`) implement the resequencer's view over the
//! same buffer; the aggregator only ever drains the whole group.

use std::time::{Duration, Instant};

use crate::headers::CorrelationId;
use crate::message::Message;

/// A keyed collection of in-flight messages awaiting release.
///
/// Groups are always mutated under their store slot's lock, so the struct
/// itself carries no synchronization.
#[derive(Debug)]
pub struct MessageGroup {
    correlation_id: CorrelationId,
    /// Unreleased members, in arrival order (not sequence order).
    messages: Vec<Message>,
    created_at: Instant,
    /// Declared total size, cached from the first member that carried one.
    sequence_size: Option<u32>,
    /// Next sequence number the resequencer expects to emit. Starts at 1.
    next_sequence: u32,
    /// How many members have been released so far.
    released: usize,
    /// Set exactly once, when the group is released or expired. A handler
    /// that raced the removal sees this and re-fetches a fresh slot.
    closed: bool,
}

impl MessageGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            messages: Vec::new(),
            created_at: Instant::now(),
            sequence_size: None,
            next_sequence: 1,
            released: 0,
            closed: false,
        }
    }

    /// The group's correlation key.
    #[must_use]
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Number of currently buffered (unreleased) members.
    #[must_use]
    pub fn size(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Buffered members in arrival order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// When the first message arrived.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time elapsed since the group was created.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Declared total sequence size, when any member has carried one.
    #[must_use]
    pub fn sequence_size(&self) -> Option<u32> {
        self.sequence_size
    }

    /// Next sequence number the resequencer expects.
    #[must_use]
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// How many members have been released.
    #[must_use]
    pub fn released(&self) -> usize {
        self.released
    }

    /// Derived completeness: every declared member has been seen (buffered
    /// or already released). Groups with unknown size are never complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.sequence_size
            .is_some_and(|size| self.released + self.messages.len() >= size as usize)
    }

    /// Whether the group has been released or expired.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mark the group released/expired. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether a buffered member carries this sequence number.
    #[must_use]
    pub fn contains_sequence(&self, sequence: u32) -> bool {
        self.messages
            .iter()
            .any(|m| m.sequence_number() == Some(sequence))
    }

    /// Whether `message` may join the group. Messages without a sequence
    /// number always may; sequenced messages are rejected when their
    /// position was already emitted or is already buffered (duplicates).
    #[must_use]
    pub fn can_add(&self, message: &Message) -> bool {
        match message.sequence_number() {
            Some(seq) => seq >= self.next_sequence && !self.contains_sequence(seq),
            None => true,
        }
    }

    /// Append a member, caching the declared size from its headers.
    pub fn add(&mut self, message: Message) {
        if self.sequence_size.is_none() {
            self.sequence_size = message.sequence_size();
        }
        self.messages.push(message);
    }

    /// Drain every buffered member in arrival order.
    pub fn take_all(&mut self) -> Vec<Message> {
        self.released += self.messages.len();
        std::mem::take(&mut self.messages)
    }

    /// Remove and return the longest contiguous run of buffered members
    /// starting at `next_sequence`, in ascending sequence order, advancing
    /// the cursor past the run. Empty when the next expected position has
    /// not arrived yet.
    pub fn take_contiguous_run(&mut self) -> Vec<Message> {
        let mut run = Vec::new();
        while let Some(pos) = self
            .messages
            .iter()
            .position(|m| m.sequence_number() == Some(self.next_sequence))
        {
            run.push(self.messages.remove(pos));
            self.next_sequence += 1;
        }
        self.released += run.len();
        run
    }

    /// Drain every buffered member in ascending sequence order, regardless
    /// of gaps. Members without a sequence number sort first, keeping their
    /// arrival order. Used by forced release.
    pub fn take_remaining_by_sequence(&mut self) -> Vec<Message> {
        let mut remaining = std::mem::take(&mut self.messages);
        remaining.sort_by_key(|m| m.sequence_number().unwrap_or(0));
        if let Some(max) = remaining.iter().filter_map(Message::sequence_number).max() {
            self.next_sequence = self.next_sequence.max(max + 1);
        }
        self.released += remaining.len();
        remaining
    }
}
