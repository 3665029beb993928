use anyhow::{Context, Result};
use bincode::{Decode, Encode};
use quinn::Connection;

// Largest single message accepted from a peer.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

// ============================================================================
// Framing
// ============================================================================

pub fn encode_message<T: Encode>(msg: &T) -> Result<Vec<u8>> {
    bincode::encode_to_vec(msg, bincode::config::standard()).context("failed to encode message")
}

pub fn decode_message<T: Decode<()>>(data: &[u8]) -> Result<T> {
    let (msg, read) = bincode::decode_from_slice(data, bincode::config::standard()).context("failed to decode message")?;
    anyhow::ensure!(read == data.len(), "{} trailing bytes after message", data.len() - read);
    Ok(msg)
}

// ============================================================================
// Message Stream
// ============================================================================

// One message per unidirectional QUIC stream, so a lost packet only stalls its own message.
pub struct MessageStream<'a> {
    connection: &'a Connection,
}

impl<'a> MessageStream<'a> {
    #[must_use]
    pub const fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }

    pub async fn send<T: Encode + Send + Sync>(&self, msg: &T) -> Result<()> {
        let data = encode_message(msg)?;
        let mut stream = self.connection.open_uni().await?;
        stream.write_all(&data).await?;
        stream.finish()?;
        Ok(())
    }

    pub async fn recv<T: Decode<()> + Send>(&self) -> Result<T> {
        let mut stream = self.connection.accept_uni().await?;
        let data = stream.read_to_end(MAX_MESSAGE_BYTES).await?;
        decode_message(&data)
    }
}
