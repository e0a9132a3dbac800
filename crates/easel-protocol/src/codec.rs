//! Codec trait and the default JSON implementation.
//!
//! The rest of the system doesn't care how messages become bytes — it
//! goes through the [`Codec`] trait. [`JsonCodec`] is the only
//! implementation today; the seam exists so a binary codec can be swapped
//! in without touching the hub or the session layer.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust types to bytes and decodes bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Human-readable frames: inspectable in browser dev tools and logs,
/// which is worth the size overhead for a chat-rate protocol like this
/// one (the draw stream is the only high-frequency traffic, and those
/// frames are tiny).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Envelope, GuessData, MessageKind};

    #[test]
    fn test_json_codec_round_trip() {
        let codec = JsonCodec;
        let env = Envelope::new(
            MessageKind::SendGuess,
            &GuessData { guess: "sunflower".into() },
        )
        .unwrap();

        let bytes = codec.encode(&env).unwrap();
        let back: Envelope = codec.decode(&bytes).unwrap();
        assert_eq!(back.kind, MessageKind::SendGuess);
    }

    #[test]
    fn test_json_codec_decode_failure() {
        let codec = JsonCodec;
        let result: Result<Envelope, _> = codec.decode(b"{{{");
        assert!(result.is_err());
    }
}
