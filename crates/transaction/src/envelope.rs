use alloy::primitives::{Address, B256};

use crate::transaction::RecoverableSignature;

/// A self-contained authentication payload: a precomputed signature,
/// the digest or message it covers, and the recovered address, framed
/// for out-of-band verification by the executing program.
///
/// Wire layout: `opcode(1) ‖ len(u32 LE) ‖ message ‖ signature(65) ‖
/// address(20)`. The heavy public-key recovery is done once, client
/// side, and attached as tamper-evident data the program cross-checks
/// positionally against the instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEnvelope {
    bytes: Vec<u8>,
}

impl AuthEnvelope {
    /// Builds an envelope carrying the full signing message pre-image.
    pub fn over_message(
        opcode: u8,
        message: &[u8],
        signature: &RecoverableSignature,
        address: Address,
    ) -> Self {
        Self::build(opcode, message, signature, address)
    }

    /// Builds an envelope carrying only the 32-byte message digest.
    ///
    /// Some executing programs verify against the pre-hashed form
    /// instead of the raw message; both shapes are supported and the
    /// program's behavior decides which is canonical.
    pub fn over_digest(
        opcode: u8,
        digest: B256,
        signature: &RecoverableSignature,
        address: Address,
    ) -> Self {
        Self::build(opcode, digest.as_slice(), signature, address)
    }

    fn build(
        opcode: u8,
        message: &[u8],
        signature: &RecoverableSignature,
        address: Address,
    ) -> Self {
        let mut bytes = Vec::with_capacity(1 + 4 + message.len() + 65 + 20);
        bytes.push(opcode);
        bytes.extend_from_slice(&(message.len() as u32).to_le_bytes());
        bytes.extend_from_slice(message);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.extend_from_slice(address.as_slice());
        Self { bytes }
    }

    /// The framed payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the envelope, returning the framed payload.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    fn signature() -> RecoverableSignature {
        RecoverableSignature { r: [0xaa; 32], s: [0xbb; 32], recovery_bit: 1 }
    }

    #[test]
    fn test_message_envelope_layout() {
        let message = b"hello world";
        let address = Address::repeat_byte(0x77);
        let envelope = AuthEnvelope::over_message(0x05, message, &signature(), address);
        let bytes = envelope.as_bytes();

        assert_eq!(bytes.len(), 1 + 4 + message.len() + 65 + 20);
        assert_eq!(bytes[0], 0x05);
        assert_eq!(&bytes[1..5], &(message.len() as u32).to_le_bytes()[..]);
        assert_eq!(&bytes[5..16], &message[..]);
        assert_eq!(&bytes[16..48], &[0xaa; 32][..]);
        assert_eq!(&bytes[48..80], &[0xbb; 32][..]);
        assert_eq!(bytes[80], 1);
        assert_eq!(&bytes[81..], address.as_slice());
    }

    #[test]
    fn test_digest_envelope_is_fixed_length() {
        let digest = keccak256(b"hello world");
        let envelope = AuthEnvelope::over_digest(0x05, digest, &signature(), Address::ZERO);
        let bytes = envelope.as_bytes();

        assert_eq!(bytes.len(), 1 + 4 + 32 + 65 + 20);
        assert_eq!(&bytes[1..5], &32u32.to_le_bytes()[..]);
        assert_eq!(&bytes[5..37], digest.as_slice());
    }
}
