//! Client session: push one file to a server.
//!
//! A [`Client`] owns its transport and its sequence counter for the life of
//! one transfer and walks [`ClientState`]:
//!
//! 1. **Init** — announce the file (size, name) with an Init at sequence 0
//!    and wait for the echo.
//! 2. **SendingData** — one Data message per chunk of up to
//!    [`DATA_MSS`] bytes, starting at sequence 1 and flipping after every
//!    acknowledged chunk.
//! 3. **Terminating** — a Term carrying the sequence number the next chunk
//!    would have used.
//!
//! Every exchange goes through [`send_reliable`], so at most one message is
//! ever unacknowledged.

use std::net::SocketAddr;
use std::path::Path;

use crate::arq::{send_reliable, Acknowledgment};
use crate::config::{ClientConfig, WIRE_MAX_FILE_SIZE};
use crate::error::SessionError;
use crate::file_store::FileSource;
use crate::message::{ControlMessage, DataMessage, Message, Seq, DATA_MSS};
use crate::progress::{human_size, ProgressReporter};
use crate::socket::Transport;
use crate::state::ClientState;

/// Outcome of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReport {
    pub file_name: String,
    /// Size as confirmed in the server's Init acknowledgment.
    pub file_size: u64,
    pub bytes_transferred: u64,
    pub data_messages: u64,
    /// Transmissions beyond the first, summed over every message.
    pub retransmissions: u64,
    pub peer: SocketAddr,
}

/// One file transfer to one server.
pub struct Client<T> {
    transport: T,
    peer: SocketAddr,
    config: ClientConfig,
    state: ClientState,
    next_seq: Seq,
    retransmissions: u64,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, peer: SocketAddr, config: ClientConfig) -> Self {
        Self {
            transport,
            peer,
            config,
            state: ClientState::Init,
            next_seq: Seq::Zero,
            retransmissions: 0,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the whole session for the file at `path`.
    ///
    /// The file is validated before anything is sent: a missing file, a
    /// directory, or a file over the configured size cap fails immediately.
    pub async fn send_file<P: ProgressReporter>(
        &mut self,
        path: impl AsRef<Path>,
        progress: &mut P,
    ) -> Result<ClientReport, SessionError> {
        let result = self.run(path.as_ref(), progress).await;
        match &result {
            Ok(report) => {
                self.transition(ClientState::Done);
                log::info!(
                    "sent {} to {}: {} B in {} messages, {} retransmissions",
                    report.file_name,
                    report.peer,
                    report.bytes_transferred,
                    report.data_messages,
                    report.retransmissions
                );
            }
            Err(e) => {
                self.transition(ClientState::Failed);
                log::warn!("transfer to {} failed: {e}", self.peer);
            }
        }
        result
    }

    async fn run<P: ProgressReporter>(
        &mut self,
        path: &Path,
        progress: &mut P,
    ) -> Result<ClientReport, SessionError> {
        let mut source = FileSource::open(path, self.config.effective_max_file_size()).await?;
        let file_name = source.file_name()?.to_owned();
        // Size was checked against the cap, which never exceeds the wire field.
        let announced = u32::try_from(source.size()).map_err(|_| SessionError::FileTooLarge {
            path: path.to_path_buf(),
            size: source.size(),
            limit: WIRE_MAX_FILE_SIZE,
        })?;

        // Init
        log::info!(
            "trying to initiate a transfer of {} with {} ...",
            source.path().display(),
            self.peer
        );
        let init: Message = ControlMessage::init(announced, file_name.as_bytes()).into();
        let Message::Control(echo) = self.exchange(&init).await?.message else {
            unreachable!("an acknowledgment always has the kind of the message it matches")
        };
        let file_size = u64::from(echo.file_size);
        log::info!(
            "file transfer initialized; sending {file_name} ({})",
            human_size(file_size)
        );

        // Data
        self.transition(ClientState::SendingData);
        self.next_seq = Seq::One;
        let sent = self.send_data(&mut source, file_size, progress).await;

        // Term, attempted even when the data loop failed.
        self.transition(ClientState::Terminating);
        let term: Message =
            ControlMessage::term(self.next_seq, announced, file_name.as_bytes()).into();
        let (bytes_transferred, data_messages) = match sent {
            Ok(counts) => {
                self.exchange(&term).await?;
                counts
            }
            Err(e) => {
                if let Err(term_err) = self.exchange(&term).await {
                    log::debug!("termination after failed data loop also failed: {term_err}");
                }
                return Err(e);
            }
        };

        Ok(ClientReport {
            file_name,
            file_size,
            bytes_transferred,
            data_messages,
            retransmissions: self.retransmissions,
            peer: self.peer,
        })
    }

    /// Send every chunk of `source`.  Returns `(bytes, messages)` sent.
    async fn send_data<P: ProgressReporter>(
        &mut self,
        source: &mut FileSource,
        total: u64,
        progress: &mut P,
    ) -> Result<(u64, u64), SessionError> {
        let mut buf = vec![0u8; DATA_MSS];
        let mut bytes = 0u64;
        let mut messages = 0u64;

        loop {
            let n = source.read_chunk(&mut buf).await?;
            if n == 0 {
                break;
            }
            let data: Message = DataMessage::new(self.next_seq, &buf[..n]).into();
            self.exchange(&data).await?;

            bytes += n as u64;
            messages += 1;
            progress.report(bytes, total);
            self.next_seq = self.next_seq.flip();
        }
        Ok((bytes, messages))
    }

    async fn exchange(&mut self, message: &Message) -> Result<Acknowledgment, SessionError> {
        let ack = send_reliable(&self.transport, self.peer, message, self.config.retry).await?;
        self.retransmissions += u64::from(ack.transmissions.saturating_sub(1));
        log::trace!(
            "{message} acknowledged after {} transmission(s), rtt {:?}",
            ack.transmissions,
            ack.rtt
        );
        Ok(ack)
    }

    fn transition(&mut self, next: ClientState) {
        log::debug!("[client] {} → {}", self.state, next);
        self.state = next;
    }
}
