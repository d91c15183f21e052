//! Wire framing for checkpoint messages.
//!
//! A checkpoint travels as the network's 4 magic bytes followed by the
//! bincode encoding of the [`SignedCheckpoint`]. Inputs over
//! [`MAX_CHECKPOINT_MESSAGE_SIZE`] are refused before any decoding, and the
//! decoder is held to the same limit so a forged length prefix cannot make it
//! allocate more.

use keel_checkpoint::SignedCheckpoint;
use keel_core::constants::{NetworkType, MAX_CHECKPOINT_MESSAGE_SIZE};
use keel_core::error::NetworkError;

/// Topic name under which checkpoint messages are pushed to peers.
pub const CHECKPOINT_TOPIC: &str = "/keel/checkpoint/1";

/// Encodes and decodes checkpoint messages for one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointCodec {
    magic: [u8; 4],
}

impl CheckpointCodec {
    pub fn new(network: NetworkType) -> Self {
        Self {
            magic: network.magic_bytes(),
        }
    }

    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    /// Frame `message` as magic + bincode payload.
    pub fn encode(&self, message: &SignedCheckpoint) -> Result<Vec<u8>, NetworkError> {
        let payload = bincode::encode_to_vec(message, bincode::config::standard())
            .map_err(|e| NetworkError::Encode(e.to_string()))?;
        let total_size = self.magic.len() + payload.len();
        if total_size > MAX_CHECKPOINT_MESSAGE_SIZE {
            return Err(NetworkError::MessageTooLarge { size: total_size });
        }
        let mut buf = Vec::with_capacity(total_size);
        buf.extend_from_slice(&self.magic);
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Parse a framed message. The signature is not checked here.
    pub fn decode(&self, data: &[u8]) -> Result<SignedCheckpoint, NetworkError> {
        if data.len() > MAX_CHECKPOINT_MESSAGE_SIZE {
            return Err(NetworkError::MessageTooLarge { size: data.len() });
        }
        if data.len() < self.magic.len() || data[..self.magic.len()] != self.magic {
            return Err(NetworkError::BadMagic);
        }
        let payload = &data[self.magic.len()..];
        let (message, read): (SignedCheckpoint, usize) =
            bincode::decode_from_slice(
                payload,
                bincode::config::standard().with_limit::<MAX_CHECKPOINT_MESSAGE_SIZE>(),
            )
            .map_err(|e| NetworkError::Decode(e.to_string()))?;
        if read != payload.len() {
            return Err(NetworkError::Decode(format!(
                "{} trailing bytes",
                payload.len() - read
            )));
        }
        Ok(message)
    }
}
