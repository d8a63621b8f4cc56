//! Server session: receive one file from one client.
//!
//! A [`Server`] walks [`ServerState`]:
//!
//! 1. **AwaitingInit** — block (no timeout) until an Init at sequence 0
//!    arrives, create the target file, echo the Init back acknowledged.
//! 2. **Receiving** — accept Data whose sequence matches the expected bit
//!    (starting at 1), append it, acknowledge it, flip the expected bit.
//!    A Term moves on to TIME_WAIT.
//! 3. **TimeWait** — close the file, acknowledge the Term, then keep
//!    re-acknowledging whatever arrives until one `time_wait` window passes
//!    in silence.  This absorbs retransmitted Terms whose acknowledgment was
//!    lost.
//!
//! # Duplicates
//!
//! With the default [`DuplicatePolicy::Ignore`], a Data message carrying the
//! *previous* sequence number (the client never saw our ack and resent it)
//! is neither written nor acknowledged.  The client then retransmits that
//! message forever and the session stalls.  This is the reference protocol
//! behavior and is kept on purpose; [`DuplicatePolicy::Reacknowledge`]
//! re-sends the acknowledgment instead.

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::time::Instant;

use crate::config::{DuplicatePolicy, ServerConfig};
use crate::error::SessionError;
use crate::file_store::{sanitize_file_name, FileSink};
use crate::message::{ControlKind, Message, MessageKind, Seq};
use crate::progress::{human_size, ProgressReporter};
use crate::socket::{recv_envelope, Transport};
use crate::state::ServerState;
use crate::timer::RetransmitTimer;

/// Outcome of a successful receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReport {
    /// Where the file was written.
    pub path: PathBuf,
    pub file_name: String,
    /// Size announced by the client's Init.
    pub file_size: u64,
    pub bytes_received: u64,
    pub data_messages: u64,
    pub peer: SocketAddr,
}

impl ServerReport {
    /// `true` when the bytes written match the size the client announced.
    pub fn is_complete(&self) -> bool {
        self.bytes_received == self.file_size
    }
}

/// Per-transfer state created by a valid Init.
struct Session {
    peer: SocketAddr,
    file_name: String,
    file_size: u64,
    sink: FileSink,
    bytes_received: u64,
    data_messages: u64,
}

/// Receives one file.
pub struct Server<T> {
    transport: T,
    config: ServerConfig,
    state: ServerState,
}

impl<T: Transport> Server<T> {
    pub fn new(transport: T, config: ServerConfig) -> Self {
        Self {
            transport,
            config,
            state: ServerState::AwaitingInit,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the whole session: wait for a client, receive its file, and
    /// linger in TIME_WAIT before returning.
    pub async fn receive_file<P: ProgressReporter>(
        &mut self,
        progress: &mut P,
    ) -> Result<ServerReport, SessionError> {
        let result = self.run(progress).await;
        match &result {
            Ok(report) => {
                self.transition(ServerState::Done);
                log::info!(
                    "received {} from {}: {} of {} B into {}",
                    report.file_name,
                    report.peer,
                    report.bytes_received,
                    report.file_size,
                    report.path.display()
                );
            }
            Err(e) => {
                self.transition(ServerState::Failed);
                log::warn!("receive failed: {e}");
            }
        }
        result
    }

    async fn run<P: ProgressReporter>(
        &mut self,
        progress: &mut P,
    ) -> Result<ServerReport, SessionError> {
        let mut session = self.await_init().await?;
        log::info!(
            "file transfer initialized; receiving {} ({}) from {} into {}",
            session.file_name,
            human_size(session.file_size),
            session.peer,
            self.config.output_dir.display()
        );

        self.transition(ServerState::Receiving);
        let term = match self.receive(&mut session, progress).await {
            Ok(term) => term,
            Err(e) => {
                if let Err(close_err) = session.sink.close().await {
                    log::debug!("closing partial file failed: {close_err}");
                }
                return Err(e);
            }
        };

        self.transition(ServerState::TimeWait);
        let path = session.sink.close().await?;
        self.time_wait(term, session.peer).await?;

        Ok(ServerReport {
            path,
            file_name: session.file_name,
            file_size: session.file_size,
            bytes_received: session.bytes_received,
            data_messages: session.data_messages,
            peer: session.peer,
        })
    }

    /// AWAITING_INIT: anything but a well-formed Init at sequence 0 is discarded.
    async fn await_init(&mut self) -> Result<Session, SessionError> {
        log::info!("waiting for a file transfer request ...");
        loop {
            let (env, from) = recv_envelope(&self.transport)
                .await
                .map_err(SessionError::Transport)?;
            let msg = match Message::decode(&env) {
                Ok(msg) => msg,
                Err(e) => {
                    log::debug!("discarding malformed datagram from {from}: {e}");
                    continue;
                }
            };
            log::debug!("← {msg}");

            let Message::Control(init) = &msg else {
                log::debug!("ignoring {msg} before session start");
                continue;
            };
            if init.kind != ControlKind::Init || init.seq != Seq::Zero {
                log::debug!("ignoring {msg} before session start");
                continue;
            }
            let Some(name) = init.file_name_str().and_then(sanitize_file_name) else {
                log::warn!("ignoring Init from {from} with unusable file name");
                continue;
            };

            let sink = FileSink::create_in_directory(&self.config.output_dir, name).await?;
            let session = Session {
                peer: from,
                file_name: name.to_owned(),
                file_size: u64::from(init.file_size),
                sink,
                bytes_received: 0,
                data_messages: 0,
            };
            self.acknowledge(&msg, from).await?;
            return Ok(session);
        }
    }

    /// RECEIVING: returns the Term that ends the data phase.
    async fn receive<P: ProgressReporter>(
        &mut self,
        session: &mut Session,
        progress: &mut P,
    ) -> Result<Message, SessionError> {
        let mut expected = Seq::One;
        loop {
            let (env, from) = recv_envelope(&self.transport)
                .await
                .map_err(SessionError::Transport)?;
            if from != session.peer {
                log::trace!("discarding datagram from {from}, not the session peer");
                continue;
            }
            let msg = match Message::decode(&env) {
                Ok(msg) => msg,
                Err(e) => {
                    log::debug!("discarding malformed datagram: {e}");
                    continue;
                }
            };
            log::debug!("← {msg}");

            if msg.kind() == MessageKind::Term {
                return Ok(msg);
            }
            match &msg {
                Message::Data(data) if data.seq == expected => {
                    session.sink.append(&data.payload).await?;
                    session.bytes_received += data.payload.len() as u64;
                    session.data_messages += 1;
                    self.acknowledge(&msg, session.peer).await?;
                    progress.report(session.bytes_received, session.file_size);
                    expected = expected.flip();
                }
                _ if is_duplicate(&msg, expected) => match self.config.duplicates {
                    DuplicatePolicy::Ignore => {
                        log::debug!("ignoring duplicate {msg} (expecting seq {expected})");
                    }
                    DuplicatePolicy::Reacknowledge => {
                        log::debug!("re-acknowledging duplicate {msg}");
                        self.acknowledge(&msg, session.peer).await?;
                    }
                },
                _ => log::debug!("ignoring unexpected {msg}"),
            }
        }
    }

    /// TIME_WAIT: acknowledge the Term, then re-acknowledge anything the
    /// peer sends until a full window passes without a message from it.
    ///
    /// Only a decoded message from the peer opens a new window; other
    /// datagrams are discarded against the current deadline.
    async fn time_wait(&mut self, term: Message, peer: SocketAddr) -> Result<(), SessionError> {
        self.acknowledge(&term, peer).await?;

        let started = Instant::now();
        'window: loop {
            let window = match self.config.time_wait_limit {
                Some(limit) => match limit.checked_sub(started.elapsed()) {
                    Some(left) if !left.is_zero() => left.min(self.config.time_wait),
                    _ => {
                        log::debug!("time-wait limit of {limit:?} reached");
                        return Ok(());
                    }
                },
                None => self.config.time_wait,
            };

            let timer = RetransmitTimer::start(window);
            while let Some(remaining) = timer.remaining() {
                let recv = tokio::time::timeout(remaining, recv_envelope(&self.transport));
                let (env, from) = match recv.await {
                    Err(_elapsed) => return Ok(()),
                    Ok(Err(e)) => {
                        log::debug!("receive failed in time-wait, closing: {e}");
                        return Ok(());
                    }
                    Ok(Ok(v)) => v,
                };
                if from != peer {
                    log::trace!("discarding datagram from {from} in time-wait");
                    continue;
                }
                match Message::decode(&env) {
                    Ok(dup) => {
                        log::debug!("← {dup} (time-wait)");
                        self.acknowledge(&dup, peer).await?;
                        continue 'window;
                    }
                    Err(e) => log::debug!("discarding malformed datagram: {e}"),
                }
            }
            return Ok(());
        }
    }

    /// Echo `msg` back with its ack flag set.
    async fn acknowledge(&self, msg: &Message, peer: SocketAddr) -> Result<(), SessionError> {
        let ack = msg.clone().acknowledged();
        let env = ack.encode()?;
        self.transport
            .send_to(env.as_bytes(), peer)
            .await
            .map_err(SessionError::Transport)?;
        log::debug!("→ {ack}");
        Ok(())
    }

    fn transition(&mut self, next: ServerState) {
        log::debug!("[server] {} → {}", self.state, next);
        self.state = next;
    }
}

/// A message the client would only send again because our acknowledgment
/// of it never arrived.
fn is_duplicate(msg: &Message, expected: Seq) -> bool {
    match msg {
        Message::Data(data) => data.seq == expected.flip(),
        Message::Control(ctrl) => ctrl.kind == ControlKind::Init && ctrl.seq == Seq::Zero,
    }
}
