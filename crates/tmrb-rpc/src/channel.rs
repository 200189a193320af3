//! TCP control channel to the Remote Build plugin.
//!
//! The channel makes a single bounded connect attempt on demand and never
//! reconnects on its own. Every transport failure drops the socket and is
//! reported to the caller as `false` or an empty string.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::error::{ChannelError, Result};
use crate::protocol::{Payload, Request};
use crate::transport::{LENGTH_PREFIX_SIZE, RemoteBuildCodec};

/// Timeout for the single connect attempt
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Timeout for each read or write once connected
pub const IO_TIMEOUT: Duration = Duration::from_secs(3);

/// Largest single read while collecting a frame body
pub const READ_CHUNK_SIZE: usize = 1024;

/// Host used when none is given
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Socket owner for one plugin host.
#[derive(Debug)]
pub struct ControlChannel {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl ControlChannel {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connect if not already connected. One attempt, bounded by
    /// [`CONNECT_TIMEOUT`].
    pub async fn connect(&mut self) -> bool {
        if self.stream.is_some() {
            return true;
        }

        let addr = (self.host.as_str(), self.port);
        match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                debug!("Connected to {}:{}", self.host, self.port);
                self.stream = Some(stream);
            }
            Ok(Err(e)) => {
                debug!("Error connecting to socket on port {}: {e}", self.port);
            }
            Err(_) => {
                debug!(
                    "Timed out connecting to socket on port {} after {CONNECT_TIMEOUT:?}",
                    self.port
                );
            }
        }
        self.stream.is_some()
    }

    /// Write a payload as raw bytes with no framing header.
    ///
    /// Returns whether any bytes were written.
    pub async fn send(&mut self, payload: impl Into<Payload>) -> bool {
        let bytes = match payload.into().into_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Error encoding payload: {e}");
                return false;
            }
        };
        self.send_bytes(&bytes).await
    }

    /// Encode and send a route request.
    pub async fn send_request(&mut self, request: Request) -> bool {
        let mut buf = BytesMut::new();
        if let Err(e) = RemoteBuildCodec::new().encode(request, &mut buf) {
            debug!("Error encoding request: {e}");
            return false;
        }
        self.send_bytes(&buf).await
    }

    async fn send_bytes(&mut self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }
        let Some(stream) = self.stream.as_mut() else {
            debug!("Error sending data: {}", ChannelError::Disconnected);
            return false;
        };

        match write_all(stream, bytes).await {
            Ok(()) => {
                debug!("Sent {} bytes", bytes.len());
                true
            }
            Err(e) => {
                debug!("Error sending data: {e}");
                self.stream = None;
                false
            }
        }
    }

    /// Read one length-prefixed response body.
    ///
    /// Returns an empty string on any failure; the partial frame is dropped.
    pub async fn receive(&mut self) -> String {
        let Some(stream) = self.stream.as_mut() else {
            debug!("Error receiving: {}", ChannelError::Disconnected);
            return String::new();
        };

        match read_frame(stream, IO_TIMEOUT).await {
            Ok(text) => text,
            Err(e) => {
                debug!("Error receiving message bytes: {e}");
                self.stream = None;
                String::new()
            }
        }
    }
}

async fn write_all(stream: &mut TcpStream, bytes: &[u8]) -> Result<()> {
    timeout(IO_TIMEOUT, stream.write_all(bytes)).await??;
    Ok(())
}

/// Read a single response frame from `reader`.
///
/// The header is read one byte at a time and the body in chunks of at most
/// [`READ_CHUNK_SIZE`]. Bytes read past the end of the frame are discarded.
///
/// # Errors
///
/// Returns an error on timeout, EOF, I/O failure, an oversized frame or a body
/// that is not valid UTF-8.
pub async fn read_frame<R>(reader: &mut R, io_timeout: Duration) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut codec = RemoteBuildCodec::new();
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        if let Some(text) = codec.decode(&mut buf)? {
            return Ok(text);
        }

        let want = if codec.has_header() {
            READ_CHUNK_SIZE
        } else {
            1
        };
        let read = timeout(io_timeout, reader.read(&mut chunk[..want])).await??;
        if read == 0 {
            return Err(ChannelError::ConnectionClosed);
        }
        buf.extend_from_slice(&chunk[..read]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Route;
    use crate::transport::encode_frame;
    use tokio::io::{AsyncWriteExt, duplex};
    use tokio::net::TcpListener;

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(body, &mut buf).unwrap();
        buf.to_vec()
    }

    #[tokio::test]
    async fn test_read_frame_one_byte_at_a_time() {
        let body = br#"{"data":"Alive","error":""}"#;
        // A one-byte pipe forces every read to return a single byte.
        let (mut client, mut server) = duplex(1);
        let bytes = framed(body);

        let writer = tokio::spawn(async move {
            server.write_all(&bytes).await.unwrap();
        });

        let text = read_frame(&mut client, IO_TIMEOUT).await.unwrap();
        writer.await.unwrap();

        assert_eq!(text.as_bytes(), body);
    }

    #[tokio::test]
    async fn test_read_frame_single_chunk() {
        let body = vec![b'x'; 4000];
        let (mut client, mut server) = duplex(64 * 1024);
        server.write_all(&framed(&body)).await.unwrap();

        let text = read_frame(&mut client, IO_TIMEOUT).await.unwrap();
        assert_eq!(text.as_bytes(), body.as_slice());
    }

    #[tokio::test]
    async fn test_read_frame_empty_body() {
        let (mut client, mut server) = duplex(64);
        server.write_all(&framed(b"")).await.unwrap();

        let text = read_frame(&mut client, IO_TIMEOUT).await.unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_read_frame_trims_overshoot() {
        let (mut client, mut server) = duplex(1024);
        let mut bytes = framed(b"first");
        bytes.extend_from_slice(b"garbage after frame");
        server.write_all(&bytes).await.unwrap();

        let text = read_frame(&mut client, IO_TIMEOUT).await.unwrap();
        assert_eq!(text, "first");
    }

    #[tokio::test]
    async fn test_read_frame_eof_mid_body() {
        let (mut client, mut server) = duplex(64);
        let bytes = framed(b"truncated body");
        server.write_all(&bytes[..8]).await.unwrap();
        drop(server);

        let result = read_frame(&mut client, IO_TIMEOUT).await;
        assert!(matches!(result, Err(ChannelError::ConnectionClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_frame_times_out() {
        let (mut client, _server) = duplex(64);
        let result = read_frame(&mut client, IO_TIMEOUT).await;
        assert!(matches!(result, Err(ChannelError::Timeout)));
    }

    #[tokio::test]
    async fn test_connect_refused_stays_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut channel = ControlChannel::new(DEFAULT_HOST, port);
        assert!(!channel.connect().await);
        assert!(!channel.is_connected());
        assert!(!channel.send("ping").await);
        assert_eq!(channel.receive().await, "");
    }

    #[tokio::test]
    async fn test_request_response_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let host = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            let request: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
            socket
                .write_all(&framed(br#"{"data":"Alive"}"#))
                .await
                .unwrap();
            request
        });

        let mut channel = ControlChannel::new(DEFAULT_HOST, port);
        assert!(channel.connect().await);
        assert!(channel.connect().await, "connect is idempotent");
        assert!(channel.send_request(Request::bare(Route::GetStatus)).await);
        assert_eq!(channel.receive().await, r#"{"data":"Alive"}"#);

        let request = host.await.unwrap();
        assert_eq!(request["route"], "get_status");
    }

    #[tokio::test]
    async fn test_receive_failure_marks_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let host = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Half a header, then hang up.
            socket.write_all(&[7, 0]).await.unwrap();
        });

        let mut channel = ControlChannel::new(DEFAULT_HOST, port);
        assert!(channel.connect().await);
        host.await.unwrap();

        assert_eq!(channel.receive().await, "");
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_send_empty_payload_writes_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

        let mut channel = ControlChannel::new(DEFAULT_HOST, port);
        assert!(channel.connect().await);
        let _peer = accept.await.unwrap();

        assert!(!channel.send(Vec::new()).await);
        assert!(channel.is_connected());
    }
}
