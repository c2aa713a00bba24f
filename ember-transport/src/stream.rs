//! Byte stream trait consumed by the session

use async_trait::async_trait;
use ember_core::{EmberError, EmberResult};

/// Duplex byte stream to a provider
///
/// Framing, keep-alive and request scheduling all live above this trait;
/// implementations only move bytes.
#[async_trait]
pub trait ByteStream: Send {
    /// Open the connection
    async fn open(&mut self) -> EmberResult<()>;

    /// Read available bytes into `buf`
    ///
    /// # Returns
    /// Number of bytes read; 0 means the peer closed the stream
    async fn read(&mut self, buf: &mut [u8]) -> EmberResult<usize>;

    /// Write bytes to the stream
    ///
    /// # Returns
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> EmberResult<usize>;

    /// Write the whole buffer
    async fn write_all(&mut self, buf: &[u8]) -> EmberResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(EmberError::Transport(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> EmberResult<()>;

    /// Check whether the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> EmberResult<()>;
}
