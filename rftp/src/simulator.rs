//! Fault-injecting transport for deterministic testing.
//!
//! Real networks drop and duplicate datagrams.  To exercise the ARQ engine
//! and the session state machines without depending on actual network
//! conditions, [`Simulator`] wraps any [`Transport`] and intercepts sends,
//! applying a configurable fault model:
//!
//! | Fault           | Description                                          |
//! |-----------------|------------------------------------------------------|
//! | Packet loss     | Drop a datagram with probability `loss_rate`.        |
//! | Duplication     | Deliver a datagram twice with `duplicate_rate`.      |
//! | Scripted drop   | Drop the next datagram matching a predicate, once.   |
//!
//! Every datagram handed to the simulator is recorded, whether or not it was
//! delivered, so tests can assert on exactly what a session transmitted.
//! Receives pass straight through to the wrapped transport.

use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::message::{Envelope, Message};
use crate::socket::Transport;

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a delivered datagram is sent twice.
    pub duplicate_rate: f64,
    /// RNG seed, so a failing run can be reproduced.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default — simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            seed: 0,
        }
    }
}

type DropRule = Box<dyn Fn(&Message) -> bool + Send>;

struct FaultState {
    rng: StdRng,
    rules: Vec<DropRule>,
    sent: Vec<Vec<u8>>,
    dropped: usize,
}

/// A fault-injecting wrapper around a transport.
pub struct Simulator<T> {
    inner: T,
    config: SimulatorConfig,
    state: Mutex<FaultState>,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            state: Mutex::new(FaultState {
                rng,
                rules: Vec::new(),
                sent: Vec::new(),
                dropped: 0,
            }),
        }
    }

    /// A simulator that injects no random faults.
    pub fn passthrough(inner: T) -> Self {
        Self::new(inner, SimulatorConfig::default())
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Drop the next outgoing datagram whose decoded message satisfies
    /// `predicate`.  Each call arms one drop.
    pub fn drop_once(&self, predicate: impl Fn(&Message) -> bool + Send + 'static) {
        self.lock().rules.push(Box::new(predicate));
    }

    /// Every datagram handed to [`Transport::send_to`], in order, including
    /// dropped ones.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// [`Simulator::sent`], decoded.  Undecodable datagrams are skipped.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.lock()
            .sent
            .iter()
            .filter_map(|bytes| Envelope::from_bytes(bytes).ok())
            .filter_map(|env| Message::decode(&env).ok())
            .collect()
    }

    /// Number of datagrams dropped so far.
    pub fn dropped(&self) -> usize {
        self.lock().dropped
    }

    fn lock(&self) -> MutexGuard<'_, FaultState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decide how many copies of `bytes` to deliver (0, 1 or 2).
    fn copies(&self, bytes: &[u8]) -> usize {
        let mut state = self.lock();
        state.sent.push(bytes.to_vec());

        let decoded = Envelope::from_bytes(bytes)
            .ok()
            .and_then(|env| Message::decode(&env).ok());
        if let Some(msg) = decoded {
            if let Some(i) = state.rules.iter().position(|rule| rule(&msg)) {
                drop(state.rules.swap_remove(i));
                state.dropped += 1;
                log::debug!("[sim] scripted drop of {msg}");
                return 0;
            }
        }

        if state.rng.random_bool(self.config.loss_rate.clamp(0.0, 1.0)) {
            state.dropped += 1;
            log::debug!("[sim] random drop ({} B)", bytes.len());
            return 0;
        }
        if state.rng.random_bool(self.config.duplicate_rate.clamp(0.0, 1.0)) {
            log::debug!("[sim] duplicating ({} B)", bytes.len());
            return 2;
        }
        1
    }
}

impl<T: Transport + Sync> Transport for Simulator<T> {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<usize> {
        let copies = self.copies(bytes);
        for _ in 0..copies {
            self.inner.send_to(bytes, dest).await?;
        }
        // A dropped datagram still looks sent to the caller.
        Ok(bytes.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{DataMessage, Seq};
    use crate::socket::{recv_envelope, Socket};
    use std::time::Duration;

    async fn pair() -> (Simulator<Socket>, Socket) {
        let a = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        (Simulator::passthrough(a), b)
    }

    fn data(seq: Seq) -> Vec<u8> {
        Message::from(DataMessage::new(seq, b"x".to_vec()))
            .encode()
            .unwrap()
            .as_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn scripted_drop_fires_once() {
        let (sim, peer) = pair().await;
        sim.drop_once(|m| m.seq() == Seq::One);

        sim.send_to(&data(Seq::One), peer.local_addr).await.unwrap();
        sim.send_to(&data(Seq::One), peer.local_addr).await.unwrap();

        let (env, _) = recv_envelope(&peer).await.unwrap();
        assert_eq!(Message::decode(&env).unwrap().seq(), Seq::One);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), recv_envelope(&peer))
                .await
                .is_err(),
            "only the second send should arrive"
        );
        assert_eq!(sim.dropped(), 1);
        assert_eq!(sim.sent().len(), 2);
    }

    #[tokio::test]
    async fn full_loss_drops_everything_but_records_it() {
        let a = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let peer = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let sim = Simulator::new(
            a,
            SimulatorConfig {
                loss_rate: 1.0,
                ..Default::default()
            },
        );

        for _ in 0..3 {
            sim.send_to(&data(Seq::Zero), peer.local_addr).await.unwrap();
        }
        assert_eq!(sim.dropped(), 3);
        assert_eq!(sim.sent_messages().len(), 3);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), recv_envelope(&peer))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn full_duplication_delivers_twice() {
        let a = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let peer = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let sim = Simulator::new(
            a,
            SimulatorConfig {
                duplicate_rate: 1.0,
                ..Default::default()
            },
        );

        sim.send_to(&data(Seq::One), peer.local_addr).await.unwrap();
        let (first, _) = recv_envelope(&peer).await.unwrap();
        let (second, _) = recv_envelope(&peer).await.unwrap();
        assert_eq!(first, second);
    }
}
