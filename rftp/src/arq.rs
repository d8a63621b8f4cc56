//! Stop-and-wait reliable send.
//!
//! [`send_reliable`] is the single primitive both client phases are built on.
//!
//! # Contract
//! - Exactly **one** message is in flight: the call does not return until
//!   that message is acknowledged or the session has to give up.
//! - An acknowledgment matches when it has the same kind and sequence number
//!   as the original and its ack flag is set ([`Message::acknowledges`]).
//! - Anything else (stale acks, malformed datagrams, traffic from another
//!   address) is discarded and the wait continues against the same deadline.
//! - On timeout the identical envelope is retransmitted.
//! - A failed transmit is fatal and never retried.
//!
//! The default [`RetryPolicy`] retransmits forever, so an unresponsive peer
//! is never abandoned by this module; set `max_transmissions` to bound it.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::SessionError;
use crate::message::Message;
use crate::socket::{recv_envelope, Transport};
use crate::timer::RetransmitTimer;

/// Default retransmission timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(50);

/// How long to wait for each acknowledgment, and how often to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// `None` retransmits indefinitely.
    pub max_transmissions: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(timeout: Duration) -> Self {
        Self {
            timeout,
            max_transmissions: None,
        }
    }

    pub fn bounded(timeout: Duration, max_transmissions: u32) -> Self {
        Self {
            timeout,
            max_transmissions: Some(max_transmissions.max(1)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(DEFAULT_TIMEOUT)
    }
}

/// A successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    /// The reply that matched.
    pub message: Message,
    /// How many times the message was transmitted (1 = no retransmission).
    pub transmissions: u32,
    /// Time from the last transmission to the matching reply.
    pub rtt: Duration,
}

/// Transmit `message` to `peer` until a matching acknowledgment arrives.
pub async fn send_reliable<T: Transport>(
    transport: &T,
    peer: SocketAddr,
    message: &Message,
    policy: RetryPolicy,
) -> Result<Acknowledgment, SessionError> {
    let envelope = message.encode()?;
    let mut transmissions = 0u32;

    loop {
        transport
            .send_to(envelope.as_bytes(), peer)
            .await
            .map_err(SessionError::Transport)?;
        transmissions += 1;
        log::debug!("→ {message}");

        let timer = RetransmitTimer::start(policy.timeout);
        while let Some(remaining) = timer.remaining() {
            let recv = tokio::time::timeout(remaining, recv_envelope(transport));
            let (reply_env, from) = match recv.await {
                Err(_elapsed) => break,
                Ok(Err(e)) => {
                    // e.g. ICMP port unreachable surfacing on the next recv.
                    log::debug!("receive failed while awaiting ack: {e}");
                    timer.expired().await;
                    break;
                }
                Ok(Ok(v)) => v,
            };
            if from != peer {
                log::trace!("discarding datagram from unexpected {from}");
                continue;
            }
            match Message::decode(&reply_env) {
                Ok(reply) if reply.acknowledges(message) => {
                    log::debug!("← {reply}");
                    return Ok(Acknowledgment {
                        message: reply,
                        transmissions,
                        rtt: timer.elapsed(),
                    });
                }
                Ok(reply) => log::debug!("← {reply} (ignored, awaiting ack of {message})"),
                Err(e) => log::debug!("discarding malformed datagram: {e}"),
            }
        }

        if policy.max_transmissions.is_some_and(|max| transmissions >= max) {
            log::warn!("{message} unacknowledged after {transmissions} transmissions");
            return Err(SessionError::RetriesExhausted(transmissions));
        }
        log::debug!("timeout after {:?}; retransmitting {message}", policy.timeout);
    }
}
