//! Per-connection session: reads command lines, dispatches LIST / UPLOAD /
//! DOWNLOAD / CHECKPOINT, and keeps going until the peer disconnects, the
//! idle timeout fires, or an unrecoverable error occurs.
//!
//! Malformed or unknown commands are logged and ignored; the session stays
//! alive awaiting the next line. Transport and storage errors end it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncSeekExt, BufWriter};
use tokio::net::TcpStream;

use filedepot_checkpoint::CheckpointStore;
use filedepot_protocol::{
    Command, Continuation, FramedStream, ProtocolError, REPLY_ERROR, REPLY_OK, REPLY_READY,
};
use filedepot_storage::{FileArea, StorageError};
use filedepot_transfer::{Direction, TransferState, file_digest};

use crate::ServerError;

pub(crate) struct Session {
    peer: SocketAddr,
    area: Arc<FileArea>,
    checkpoints: Arc<CheckpointStore>,
    idle_timeout: Duration,
}

impl Session {
    pub(crate) fn new(
        peer: SocketAddr,
        area: Arc<FileArea>,
        checkpoints: Arc<CheckpointStore>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            peer,
            area,
            checkpoints,
            idle_timeout,
        }
    }

    /// Runs the session to completion. Never returns an error to the
    /// caller; everything ends in a logged close.
    pub(crate) async fn run(self, stream: TcpStream) {
        let peer = self.peer;
        tracing::info!(%peer, "session opened");

        let mut channel = FramedStream::new(stream);
        loop {
            let line = match tokio::time::timeout(self.idle_timeout, channel.read_line()).await {
                Err(_) => {
                    tracing::info!(%peer, "idle timeout, closing session");
                    break;
                }
                Ok(Err(ProtocolError::ConnectionClosed)) => {
                    tracing::info!(%peer, "peer disconnected");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::error!(%peer, "read error: {e}");
                    break;
                }
                Ok(Ok(line)) => line,
            };

            let command = match Command::parse(&line) {
                Ok(c) => c,
                Err(e) => {
                    // Protocol errors do not terminate the session.
                    tracing::warn!(%peer, %line, "ignoring malformed command: {e}");
                    continue;
                }
            };

            let result = match command {
                Command::List => self.handle_list(&mut channel).await,
                Command::Upload { name, size } => {
                    self.handle_upload(&mut channel, &name, size).await
                }
                Command::Download { name } => self.handle_download(&mut channel, &name).await,
                Command::Checkpoint { name, offset } => {
                    self.handle_checkpoint(&mut channel, &name, offset).await
                }
            };

            if let Err(e) = result {
                if e.is_disconnect() {
                    tracing::warn!(%peer, "connection lost mid-exchange");
                } else {
                    tracing::error!(%peer, "session error: {e}");
                }
                break;
            }
        }

        tracing::info!(%peer, "session closed");
    }

    /// LIST: current filenames, one per line, closed by a blank line.
    async fn handle_list(
        &self,
        channel: &mut FramedStream<TcpStream>,
    ) -> Result<(), ServerError> {
        let names = self.area.list()?;
        for name in &names {
            channel.write_line(name).await?;
        }
        channel.write_line("").await?;
        tracing::info!(peer = %self.peer, count = names.len(), "listed files");
        Ok(())
    }

    /// UPLOAD: archive any colliding current file, reply READY, receive the
    /// declared bytes, then send the digest of the just-written file.
    async fn handle_upload(
        &self,
        channel: &mut FramedStream<TcpStream>,
        name: &str,
        size: u64,
    ) -> Result<(), ServerError> {
        let (path, file) = match self.area.begin_upload(name).await {
            Ok(target) => target,
            Err(StorageError::InvalidName(reason)) => {
                tracing::warn!(peer = %self.peer, %name, "rejecting upload: {reason}");
                channel.write_line(REPLY_ERROR).await?;
                return Ok(());
            }
            // Storage errors are fatal to the session.
            Err(e) => return Err(e.into()),
        };

        channel.write_line(REPLY_READY).await?;

        let state = TransferState::new(name, Direction::Inbound, size);
        state.start();
        let mut sink = BufWriter::new(file);
        channel
            .receive_payload(size, &mut sink, |chunk| {
                state.add_progress(chunk.len() as u64);
            })
            .await?;
        state.complete();

        // The digest covers the file as written, not just the bytes seen in
        // flight, so disk-level corruption is caught too.
        let digest = file_digest(&path).await?;
        channel.write_line(&digest).await?;

        tracing::info!(
            peer = %self.peer,
            %name,
            size,
            stored = %path.display(),
            "upload complete"
        );
        Ok(())
    }

    /// DOWNLOAD: announce the size, await READY or RESUME, stream from the
    /// requested offset, then send the digest of the entire file so resumed
    /// and fresh downloads verify identically.
    async fn handle_download(
        &self,
        channel: &mut FramedStream<TcpStream>,
        name: &str,
    ) -> Result<(), ServerError> {
        let path = match self.area.resolve(name) {
            Ok(p) => p,
            Err(StorageError::NotFound(_)) | Err(StorageError::InvalidName(_)) => {
                tracing::warn!(peer = %self.peer, %name, "download of unavailable file");
                channel.write_line(REPLY_ERROR).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let size = tokio::fs::metadata(&path).await?.len();
        channel.write_line(&size.to_string()).await?;

        let line = channel.read_line().await?;
        let offset = match Continuation::parse(&line) {
            Ok(c) => c.offset(),
            Err(e) => {
                tracing::warn!(peer = %self.peer, %line, "aborting exchange: {e}");
                return Ok(());
            }
        };
        if offset > size {
            tracing::warn!(peer = %self.peer, %name, offset, size, "resume offset beyond file");
            channel.write_line(REPLY_ERROR).await?;
            return Ok(());
        }

        let mut file = tokio::fs::File::open(&path).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;

        let state = TransferState::new(name, Direction::Outbound, size);
        state.start();
        state.add_progress(offset);
        channel
            .send_payload(&mut file, |chunk| {
                state.add_progress(chunk.len() as u64);
            })
            .await?;
        state.complete();

        // Digest of the whole file, not the resumed tail.
        let digest = file_digest(&path).await?;
        channel.write_line(&digest).await?;

        // The transfer reached the peer in full; its resume record has
        // served its purpose.
        if self.checkpoints.remove(name).await? {
            tracing::debug!(peer = %self.peer, %name, "cleared server-side checkpoint");
        }

        tracing::info!(peer = %self.peer, %name, size, offset, "download complete");
        Ok(())
    }

    /// CHECKPOINT: advisory bookkeeping so the peer can resume later.
    async fn handle_checkpoint(
        &self,
        channel: &mut FramedStream<TcpStream>,
        name: &str,
        offset: u64,
    ) -> Result<(), ServerError> {
        self.checkpoints
            .record(name, &self.peer.to_string(), offset)
            .await?;
        channel.write_line(REPLY_OK).await?;
        tracing::info!(peer = %self.peer, %name, offset, "checkpoint stored");
        Ok(())
    }
}
