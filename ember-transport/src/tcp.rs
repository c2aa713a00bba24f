//! TCP transport implementation

use crate::stream::ByteStream;
use async_trait::async_trait;
use ember_core::{EmberError, EmberResult, DEFAULT_PORT};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP byte stream to an Ember+ provider
///
/// Created closed; `open` resolves the host and connects within the
/// configured timeout.
#[derive(Debug)]
pub struct TcpByteStream {
    host: String,
    port: u16,
    connect_timeout: Option<Duration>,
    stream: Option<TcpStream>,
    closed: bool,
}

impl TcpByteStream {
    /// Create a transport for the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Some(Duration::from_secs(5)),
            stream: None,
            closed: true,
        }
    }

    /// Create a transport for the default Ember+ port
    pub fn with_default_port(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT)
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn stream_mut(&mut self) -> EmberResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            EmberError::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

#[async_trait]
impl ByteStream for TcpByteStream {
    async fn open(&mut self) -> EmberResult<()> {
        if !self.closed {
            return Err(EmberError::Transport(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let address = (self.host.as_str(), self.port);
        let stream = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, TcpStream::connect(address))
                .await
                .map_err(|_| EmberError::Timeout)??,
            None => TcpStream::connect(address).await?,
        };
        stream.set_nodelay(true)?;

        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> EmberResult<usize> {
        let stream = self.stream_mut()?;
        match stream.read(buf).await {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(EmberError::Transport(e))
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> EmberResult<usize> {
        let stream = self.stream_mut()?;
        stream.write(buf).await.map_err(EmberError::Transport)
    }

    async fn flush(&mut self) -> EmberResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(EmberError::Transport)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> EmberResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_closed() {
        let transport = TcpByteStream::with_default_port("127.0.0.1");
        assert!(transport.is_closed());
        assert_eq!(transport.port, 9000);
    }

    #[tokio::test]
    async fn test_read_before_open_fails() {
        let mut transport = TcpByteStream::new("127.0.0.1", 9000);
        let mut buf = [0u8; 8];
        assert!(transport.read(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_loopback_round_trip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 3];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let mut transport = TcpByteStream::new("127.0.0.1", address.port());
        transport.open().await.unwrap();
        transport.write_all(&[1, 2, 3]).await.unwrap();
        transport.flush().await.unwrap();

        let mut buf = [0u8; 3];
        let mut read = 0;
        while read < 3 {
            read += transport.read(&mut buf[read..]).await.unwrap();
        }
        assert_eq!(buf, [1, 2, 3]);

        transport.close().await.unwrap();
        assert!(transport.is_closed());
        server.await.unwrap();
    }
}
