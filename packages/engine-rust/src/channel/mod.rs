//! Channel implementations and the channel registry.
//!
//! The traits live in `switchyard-core`; this module provides the concrete
//! destinations: a bounded pollable queue, a push-based subscribable
//! channel, a single-use reply slot, and the always-discarding null channel.

mod direct;
mod null;
mod queue;
mod registry;
mod reply;

pub use direct::SubscribableChannel;
pub use null::NullChannel;
pub use queue::QueueChannel;
pub use registry::ChannelRegistry;
pub use reply::ReplySlot;
