use std::cmp;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{CHUNK_SIZE, MAX_LINE_LEN, ProtocolError};

/// Converts an unstructured stream socket into discrete protocol exchanges:
/// newline-terminated command lines and length-declared binary payloads.
///
/// Bytes read past a line terminator are retained for the next logical read,
/// whether that read is another line or a payload. One socket read never
/// maps to one message.
pub struct FramedStream<S> {
    stream: S,
    /// Residue from previous reads, consumed before touching the socket.
    buf: Vec<u8>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    /// Reads one command line, buffering until `\n` appears.
    ///
    /// The returned line is trimmed of the terminator and surrounding
    /// whitespace. A zero-byte read before the terminator means the peer
    /// closed the connection; more than [`MAX_LINE_LEN`] buffered bytes
    /// without a terminator is a protocol violation, so a flooding peer
    /// cannot grow the buffer without bound.
    pub async fn read_line(&mut self) -> Result<String, ProtocolError> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line[..line.len() - 1]);
                return Ok(text.trim().to_string());
            }

            if self.buf.len() > MAX_LINE_LEN {
                return Err(ProtocolError::LineTooLong);
            }

            let mut chunk = [0u8; 1024];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Writes `line` followed by the `\n` terminator and flushes.
    pub async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receives exactly `size` bytes into `sink`, looping over however many
    /// socket reads that takes. `observe` sees every chunk in order, for
    /// digest and progress accounting.
    ///
    /// An early EOF is a truncated transfer and yields
    /// [`ProtocolError::ConnectionClosed`]; the bytes already written to
    /// `sink` are left in place.
    pub async fn receive_payload<W, F>(
        &mut self,
        size: u64,
        sink: &mut W,
        mut observe: F,
    ) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin,
        F: FnMut(&[u8]),
    {
        let mut remaining = size;

        // Payload bytes may already sit in the residue buffer behind the
        // command line that announced them.
        if remaining > 0 && !self.buf.is_empty() {
            let take = cmp::min(remaining as usize, self.buf.len());
            let chunk: Vec<u8> = self.buf.drain(..take).collect();
            sink.write_all(&chunk).await?;
            observe(&chunk);
            remaining -= take as u64;
        }

        let mut chunk = vec![0u8; CHUNK_SIZE];
        while remaining > 0 {
            let want = cmp::min(remaining as usize, chunk.len());
            let n = self.stream.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
            sink.write_all(&chunk[..n]).await?;
            observe(&chunk[..n]);
            remaining -= n as u64;
        }

        sink.flush().await?;
        Ok(())
    }

    /// Streams `source` to the peer in fixed-size chunks until EOF.
    ///
    /// The caller positions `source` (e.g. seeks to a resume offset) before
    /// calling. Returns the number of bytes sent.
    pub async fn send_payload<R, F>(
        &mut self,
        source: &mut R,
        mut observe: F,
    ) -> Result<u64, ProtocolError>
    where
        R: AsyncRead + Unpin,
        F: FnMut(&[u8]),
    {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut sent = 0u64;
        loop {
            let n = source.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            self.stream.write_all(&chunk[..n]).await?;
            observe(&chunk[..n]);
            sent += n as u64;
        }
        self.stream.flush().await?;
        Ok(sent)
    }
}
