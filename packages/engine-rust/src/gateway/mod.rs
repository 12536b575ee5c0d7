//! Request/reply gateway: one call, one exchange, one reply.
//!
//! Each exchange is a single-use state machine. The default reply path is a
//! private [`ReplySlot`] attached to the outbound request, so unrelated
//! exchanges can never cross-talk. When a shared reply channel is configured
//! instead, a spawned demultiplexer task matches replies back to their
//! pending exchange by the correlation token stamped on the request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use switchyard_core::{
    CorrelationId, ErrorPayload, Message, MessageBuilder, MessageChannel, PollableChannel,
};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::channel::ReplySlot;
use crate::error::GatewayError;

// ---------------------------------------------------------------------------
// ExchangeState / PendingRequest
// ---------------------------------------------------------------------------

/// Lifecycle of one exchange. Never reused: a new exchange starts over at
/// `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Created,
    AwaitingReply,
    Replied,
    TimedOut,
    Failed,
}

/// A demultiplexed exchange waiting on the shared reply channel.
struct PendingRequest {
    tx: oneshot::Sender<Message>,
    requested_at: Instant,
}

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Gateway behavior knobs.
#[derive(Clone)]
pub struct GatewayConfig {
    /// How long `exchange` waits for a reply.
    pub reply_timeout: Duration,
    /// When no error channel is configured, a timeout becomes
    /// [`GatewayError::Timeout`] if set, `Ok(None)` otherwise.
    pub error_on_timeout: bool,
    /// Destination for timeout and error-reply flows. One error exchange at
    /// most; its failures are never rerouted again.
    pub error_channel: Option<Arc<dyn MessageChannel>>,
    /// Shared reply channel. When set, replies are demultiplexed by
    /// correlation token instead of per-exchange reply slots.
    pub reply_channel: Option<Arc<dyn PollableChannel>>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_millis(1000),
            error_on_timeout: false,
            error_channel: None,
            reply_channel: None,
        }
    }
}

// ---------------------------------------------------------------------------
// MessagingGateway
// ---------------------------------------------------------------------------

/// Synchronous-looking request/reply over asynchronous channels.
pub struct MessagingGateway {
    request_channel: Arc<dyn MessageChannel>,
    config: GatewayConfig,
    pending: Arc<DashMap<CorrelationId, PendingRequest>>,
    demux_shutdown: Option<oneshot::Sender<()>>,
    demux_handle: Option<tokio::task::JoinHandle<()>>,
}

impl MessagingGateway {
    /// Create a gateway sending requests on `request_channel`. When the
    /// config carries a shared reply channel, the demultiplexer task is
    /// spawned here.
    #[must_use]
    pub fn new(request_channel: Arc<dyn MessageChannel>, config: GatewayConfig) -> Self {
        let pending: Arc<DashMap<CorrelationId, PendingRequest>> = Arc::new(DashMap::new());

        let (demux_shutdown, demux_handle) = match &config.reply_channel {
            Some(replies) => {
                let (tx, rx) = oneshot::channel();
                let handle = tokio::spawn(demux_loop(
                    Arc::clone(replies),
                    Arc::clone(&pending),
                    rx,
                ));
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        Self {
            request_channel,
            config,
            pending,
            demux_shutdown,
            demux_handle,
        }
    }

    /// Send `request` and wait for its reply.
    ///
    /// `Ok(None)` means the exchange timed out and timeouts are not treated
    /// as errors. An error reply resolves the exchange as failed unless an
    /// error channel is configured, in which case the error message takes
    /// one (and only one) error-flow exchange whose reply is returned
    /// instead.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Send`] when the request cannot be delivered,
    /// [`GatewayError::Timeout`] per `error_on_timeout`,
    /// [`GatewayError::ErrorReply`] for unrerouted error replies, and
    /// [`GatewayError::ReplyPathClosed`] when the reply path is dropped.
    pub async fn exchange(&self, request: Message) -> Result<Option<Message>, GatewayError> {
        tracing::debug!(message_id = %request.id(), state = ?ExchangeState::Created, "exchange");
        let outcome = if self.config.reply_channel.is_some() {
            self.exchange_demuxed(request).await
        } else {
            self.exchange_slotted(request).await
        };
        self.resolve(outcome, true).await
    }

    /// One-way send: no reply correlation. A delivery failure goes to the
    /// error channel as an error message when one is configured, otherwise
    /// it surfaces to the caller.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Send`] when delivery fails and no error channel is
    /// configured.
    pub async fn send(&self, request: Message) -> Result<(), GatewayError> {
        let Err(err) = self.request_channel.send(request.clone()).await else {
            return Ok(());
        };

        match &self.config.error_channel {
            Some(error_channel) => {
                tracing::warn!(
                    message_id = %request.id(),
                    %err,
                    "send failed, routing to error channel",
                );
                let error_message =
                    Message::error_message(Box::new(err), Some(request));
                error_channel
                    .send(error_message)
                    .await
                    .map_err(GatewayError::Send)
            }
            None => Err(GatewayError::Send(err)),
        }
    }

    /// Stop the demultiplexer task, if one is running. Pending exchanges
    /// resolve as [`GatewayError::ReplyPathClosed`].
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.demux_shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.demux_handle.take() {
            let _ = handle.await;
        }
        self.pending.clear();
    }

    // --- exchange paths ---

    async fn exchange_slotted(&self, request: Message) -> Outcome {
        let (slot, rx) = ReplySlot::new();
        let request = MessageBuilder::from_message(&request)
            .reply_channel(slot as Arc<dyn MessageChannel>)
            .build();

        if let Err(err) = self.request_channel.send(request).await {
            return Outcome::SendFailed(err);
        }
        tracing::debug!(state = ?ExchangeState::AwaitingReply, "exchange");
        match tokio::time::timeout(self.config.reply_timeout, rx).await {
            Ok(Ok(reply)) => Outcome::Replied(reply),
            Ok(Err(_)) => Outcome::Closed,
            Err(_) => Outcome::TimedOut,
        }
    }

    async fn exchange_demuxed(&self, request: Message) -> Outcome {
        // A fresh token, not the message id: builders assign new ids, so the
        // responder copies `correlationId` instead.
        let token = CorrelationId::Id(Uuid::new_v4());
        let request = MessageBuilder::from_message(&request)
            .correlation_id(token.clone())
            .build();

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            token.clone(),
            PendingRequest {
                tx,
                requested_at: Instant::now(),
            },
        );

        if let Err(err) = self.request_channel.send(request).await {
            self.pending.remove(&token);
            return Outcome::SendFailed(err);
        }
        tracing::debug!(state = ?ExchangeState::AwaitingReply, "exchange");
        let outcome = match tokio::time::timeout(self.config.reply_timeout, rx).await {
            Ok(Ok(reply)) => Outcome::Replied(reply),
            Ok(Err(_)) => Outcome::Closed,
            Err(_) => Outcome::TimedOut,
        };
        self.pending.remove(&token);
        outcome
    }

    // --- resolution ---

    /// Turn a raw outcome into the caller-visible result. `reroute` guards
    /// the error-channel depth: the error flow itself resolves with it
    /// unset, so a failing error flow falls through to plain errors.
    async fn resolve(
        &self,
        outcome: Outcome,
        reroute: bool,
    ) -> Result<Option<Message>, GatewayError> {
        match outcome {
            Outcome::Replied(reply) if reply.is_error_message() => {
                tracing::debug!(state = ?ExchangeState::Failed, "exchange");
                if reroute && self.config.error_channel.is_some() {
                    return self.run_error_flow(reply).await;
                }
                let detail = reply
                    .payload_as::<ErrorPayload>()
                    .map_or_else(|| "unknown error".to_string(), ToString::to_string);
                Err(GatewayError::ErrorReply { detail, reply })
            }
            Outcome::Replied(reply) => {
                tracing::debug!(state = ?ExchangeState::Replied, "exchange");
                Ok(Some(reply))
            }
            Outcome::TimedOut => {
                tracing::debug!(state = ?ExchangeState::TimedOut, "exchange");
                if reroute && self.config.error_channel.is_some() {
                    let timeout_message = Message::error_message(
                        Box::new(GatewayError::Timeout {
                            timeout: self.config.reply_timeout,
                        }),
                        None,
                    );
                    return self.run_error_flow(timeout_message).await;
                }
                if self.config.error_on_timeout {
                    Err(GatewayError::Timeout {
                        timeout: self.config.reply_timeout,
                    })
                } else {
                    Ok(None)
                }
            }
            Outcome::SendFailed(err) => {
                tracing::debug!(state = ?ExchangeState::Failed, "exchange");
                Err(GatewayError::Send(err))
            }
            Outcome::Closed => Err(GatewayError::ReplyPathClosed),
        }
    }

    /// One error-flow exchange over the error channel: a private reply slot,
    /// the configured timeout, and no further rerouting.
    async fn run_error_flow(&self, error_message: Message) -> Result<Option<Message>, GatewayError> {
        // resolve() only calls this when the channel is configured.
        let Some(error_channel) = &self.config.error_channel else {
            return Err(GatewayError::ReplyPathClosed);
        };

        let (slot, rx) = ReplySlot::new();
        let error_message = MessageBuilder::from_message(&error_message)
            .reply_channel(slot as Arc<dyn MessageChannel>)
            .build();

        if let Err(err) = error_channel.send(error_message).await {
            return Err(GatewayError::Send(err));
        }
        let outcome = match tokio::time::timeout(self.config.reply_timeout, rx).await {
            Ok(Ok(reply)) => Outcome::Replied(reply),
            Ok(Err(_)) => Outcome::Closed,
            Err(_) => Outcome::TimedOut,
        };
        Box::pin(self.resolve(outcome, false)).await
    }
}

impl Drop for MessagingGateway {
    fn drop(&mut self) {
        if let Some(tx) = self.demux_shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Raw result of waiting on a reply path.
enum Outcome {
    Replied(Message),
    TimedOut,
    SendFailed(switchyard_core::DeliveryError),
    Closed,
}

// ---------------------------------------------------------------------------
// Demultiplexer
// ---------------------------------------------------------------------------

const DEMUX_POLL: Duration = Duration::from_millis(50);

/// Poll the shared reply channel and complete pending exchanges by
/// correlation token. Unmatched or late replies are dropped.
async fn demux_loop(
    replies: Arc<dyn PollableChannel>,
    pending: Arc<DashMap<CorrelationId, PendingRequest>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            reply = replies.receive(DEMUX_POLL) => {
                let Some(reply) = reply else { continue };
                let Some(token) = reply.correlation_id().cloned() else {
                    tracing::warn!(message_id = %reply.id(), "reply without correlation token dropped");
                    continue;
                };
                match pending.remove(&token) {
                    Some((_, request)) => {
                        if request.tx.send(reply).is_err() {
                            tracing::warn!(
                                correlation_id = %token,
                                waited = ?request.requested_at.elapsed(),
                                "reply arrived after its exchange resolved",
                            );
                        }
                    }
                    None => {
                        tracing::warn!(correlation_id = %token, "unmatched reply dropped");
                    }
                }
            }
            _ = &mut shutdown => break,
        }
    }
}
