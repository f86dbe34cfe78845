use alloy::primitives::{keccak256, Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use loaderkit_rlp::{decode, encode, Item};
use tracing::trace;

use crate::error::Error;

/// An Ethereum-style transaction, decoded from its RLP 9-tuple
/// `(nonce, gasPrice, gasLimit, to, value, data, v, r, s)`.
///
/// The struct is a plain value: the signing hash and sender are pure
/// functions of the fields and are recomputed on every call, never
/// cached across chain-id variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The sender's transaction count.
    pub nonce: U256,

    /// Price per unit of gas.
    pub gas_price: U256,

    /// Maximum gas the transaction may consume.
    pub gas_limit: U256,

    /// The callee address, or `None` for contract creation.
    pub to: Option<Address>,

    /// Value transferred with the call.
    pub value: U256,

    /// Call data passed to the callee.
    pub data: Vec<u8>,

    /// Recovery parity and chain identifier, packed per EIP-155.
    pub v: u64,

    /// First signature scalar, as a big-endian integer.
    pub r: U256,

    /// Second signature scalar, as a big-endian integer.
    pub s: U256,
}

/// A signature in recoverable wire form: `r ‖ s ‖ recovery_bit`, with
/// both scalars zero-padded to 32 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// First signature scalar, 32 bytes big-endian.
    pub r: [u8; 32],

    /// Second signature scalar, 32 bytes big-endian.
    pub s: [u8; 32],

    /// Recovery parity of the public key's y coordinate (0 or 1).
    pub recovery_bit: u8,
}

impl RecoverableSignature {
    /// Serializes the signature to its 65-byte wire form.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_bit;
        out
    }
}

impl Transaction {
    /// Constructs an unsigned transaction from field values. The
    /// signature triple is zeroed until [`Transaction::sign`] is called.
    pub fn new_unsigned(
        nonce: U256,
        gas_price: U256,
        gas_limit: U256,
        to: Option<Address>,
        value: U256,
        data: Vec<u8>,
    ) -> Self {
        Self { nonce, gas_price, gas_limit, to, value, data, v: 0, r: U256::ZERO, s: U256::ZERO }
    }

    /// Decodes a transaction from its raw RLP encoding.
    ///
    /// Integers are taken as the big-endian value of their byte string,
    /// with the empty string (or null) meaning zero. `to` must be either
    /// empty (contract creation) or exactly 20 bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, Error> {
        let (item, remainder) = decode(raw)?;
        if !remainder.is_empty() {
            return Err(Error::MalformedEncoding(format!(
                "{} trailing bytes after transaction",
                remainder.len()
            )));
        }

        let fields = item
            .as_list()
            .ok_or_else(|| Error::MalformedEncoding("expected a list".to_string()))?;
        if fields.len() != 9 {
            return Err(Error::MalformedEncoding(format!(
                "expected 9 fields, found {}",
                fields.len()
            )));
        }

        let tx = Self {
            nonce: uint_field(&fields[0], "nonce")?,
            gas_price: uint_field(&fields[1], "gasPrice")?,
            gas_limit: uint_field(&fields[2], "gasLimit")?,
            to: address_field(&fields[3])?,
            value: uint_field(&fields[4], "value")?,
            data: bytes_field(&fields[5], "data")?,
            v: u64_field(&fields[6], "v")?,
            r: uint_field(&fields[7], "r")?,
            s: uint_field(&fields[8], "s")?,
        };
        trace!("decoded transaction with nonce {} to {:?}", tx.nonce, tx.to);

        Ok(tx)
    }

    /// Re-encodes the signed 9-tuple. Integers serialize as their
    /// minimal-length big-endian form, so `decode . encode` is identity
    /// on canonical inputs.
    pub fn encode(&self) -> Vec<u8> {
        encode(&Item::List(vec![
            uint_item(self.nonce),
            uint_item(self.gas_price),
            uint_item(self.gas_limit),
            address_item(self.to),
            uint_item(self.value),
            Item::Bytes(self.data.clone()),
            uint_item(U256::from(self.v)),
            uint_item(self.r),
            uint_item(self.s),
        ]))
    }

    /// Extracts the chain identifier packed into `v`, computed as
    /// `((v - 1) / 2) - 17` with floor division so that both parities of
    /// a replay-protected `v` map to the same chain id.
    ///
    /// Fails with [`Error::InconsistentChainId`] for `v < 35`, where the
    /// arithmetic would go negative; such transactions remain valid for
    /// legacy hashing via an explicit chain-id override.
    pub fn chain_id(&self) -> Result<u64, Error> {
        if self.v < 35 {
            return Err(Error::InconsistentChainId { v: self.v });
        }
        Ok((self.v - 1) / 2 - 17)
    }

    /// Builds the pre-image of the signing hash: the 9-tuple with
    /// `(v, r, s)` replaced by `(chain_id, null, null)`, where
    /// `chain_id` is the override if given, otherwise derived from `v`.
    ///
    /// Integers keep their minimal-length encoding here; in particular
    /// `r` and `s` are never zero-padded to 32 bytes.
    pub fn signing_message(&self, chain_id_override: Option<u64>) -> Result<Vec<u8>, Error> {
        let chain_id = match chain_id_override {
            Some(id) => id,
            None => self.chain_id()?,
        };

        Ok(encode(&Item::List(vec![
            uint_item(self.nonce),
            uint_item(self.gas_price),
            uint_item(self.gas_limit),
            address_item(self.to),
            uint_item(self.value),
            Item::Bytes(self.data.clone()),
            uint_item(U256::from(chain_id)),
            Item::Empty,
            Item::Empty,
        ])))
    }

    /// Computes the chain-qualified signing hash: keccak256 of
    /// [`Transaction::signing_message`].
    pub fn signing_hash(&self, chain_id_override: Option<u64>) -> Result<B256, Error> {
        Ok(keccak256(self.signing_message(chain_id_override)?))
    }

    /// Returns the signature in recoverable wire form.
    ///
    /// The recovery bit is `1 - (v % 2)`: an even `v` means parity 1 and
    /// an odd `v` means parity 0. This holds for both the legacy 27/28
    /// range and replay-protected values.
    pub fn signature(&self) -> Result<RecoverableSignature, Error> {
        if self.r.is_zero() {
            return Err(Error::InvalidSignature("r scalar is zero".to_string()));
        }

        Ok(RecoverableSignature {
            r: self.r.to_be_bytes::<32>(),
            s: self.s.to_be_bytes::<32>(),
            recovery_bit: 1 - (self.v % 2) as u8,
        })
    }

    /// Recovers the 20-byte sending address from the signature over the
    /// chain-qualified signing hash.
    pub fn sender(&self) -> Result<Address, Error> {
        let signature = self.signature()?;
        let hash = self.signing_hash(None)?;
        recover_address(hash.as_slice(), &signature)
    }

    /// Signs the transaction with the given key, packing the chain id
    /// and recovery parity into `v` as `2 * chain_id + 35 + parity`.
    pub fn sign(&mut self, key: &SigningKey, chain_id: u64) -> Result<(), Error> {
        let hash = self.signing_hash(Some(chain_id))?;
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;

        let bytes = signature.to_bytes();
        self.v = 2 * chain_id + 35 + u64::from(recovery_id.to_byte());
        self.r = U256::from_be_slice(&bytes[..32]);
        self.s = U256::from_be_slice(&bytes[32..]);
        Ok(())
    }

    /// Builds the execution request wire form consumed by the executing
    /// program: `sender(20) ‖ signature(65) ‖ signing message`.
    pub fn execution_payload(&self) -> Result<Vec<u8>, Error> {
        let sender = self.sender()?;
        let signature = self.signature()?;
        let message = self.signing_message(None)?;

        let mut out = Vec::with_capacity(20 + 65 + message.len());
        out.extend_from_slice(sender.as_slice());
        out.extend_from_slice(&signature.to_bytes());
        out.extend_from_slice(&message);
        Ok(out)
    }
}

/// Recovers the signing address from a 32-byte prehash and a recoverable
/// signature: ECDSA public-key recovery, then the low 20 bytes of the
/// keccak256 of the uncompressed public key coordinates.
pub fn recover_address(prehash: &[u8], signature: &RecoverableSignature) -> Result<Address, Error> {
    let sig = Signature::from_scalars(signature.r, signature.s)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(signature.recovery_bit)
        .ok_or_else(|| {
            Error::InvalidSignature(format!("invalid recovery bit {}", signature.recovery_bit))
        })?;

    let key = VerifyingKey::recover_from_prehash(prehash, &sig, recovery_id)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;

    // drop the 0x04 uncompressed-point prefix before hashing
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    Ok(Address::from_slice(&digest[12..]))
}

fn uint_field(item: &Item, name: &str) -> Result<U256, Error> {
    let bytes = item
        .as_bytes()
        .ok_or_else(|| Error::MalformedEncoding(format!("{name} must be a byte string")))?;
    if bytes.len() > 32 {
        return Err(Error::MalformedEncoding(format!(
            "{name} is {} bytes, expected at most 32",
            bytes.len()
        )));
    }
    Ok(U256::from_be_slice(bytes))
}

fn u64_field(item: &Item, name: &str) -> Result<u64, Error> {
    let bytes = item
        .as_bytes()
        .ok_or_else(|| Error::MalformedEncoding(format!("{name} must be a byte string")))?;
    if bytes.len() > 8 {
        return Err(Error::MalformedEncoding(format!(
            "{name} is {} bytes, expected at most 8",
            bytes.len()
        )));
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn bytes_field(item: &Item, name: &str) -> Result<Vec<u8>, Error> {
    item.as_bytes()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| Error::MalformedEncoding(format!("{name} must be a byte string")))
}

fn address_field(item: &Item) -> Result<Option<Address>, Error> {
    let bytes = item
        .as_bytes()
        .ok_or_else(|| Error::MalformedEncoding("to must be a byte string".to_string()))?;
    match bytes.len() {
        0 => Ok(None),
        20 => Ok(Some(Address::from_slice(bytes))),
        n => Err(Error::MalformedEncoding(format!("to is {n} bytes, expected 0 or 20"))),
    }
}

fn uint_item(value: U256) -> Item {
    Item::Bytes(value.to_be_bytes_trimmed_vec())
}

fn address_item(address: Option<Address>) -> Item {
    match address {
        Some(address) => Item::Bytes(address.to_vec()),
        None => Item::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE_TX: &str = "f86c018522ecb25c0082520894a090e606e30bd747d4e6245a1517ebe430f0057e\
                              880340c0086a5cbe008025a0e213a2a87b050644f9c982144fa762132bbc00b9ac\
                              63d168d68146e300de6b4ba059dbbae6d190d820ddde818a98204232194eb6d27\
                              226190b4c0be82480d6a735";

    fn example_tx() -> Transaction {
        Transaction::decode(&hex::decode(EXAMPLE_TX).expect("valid hex")).expect("should decode")
    }

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[0x42u8; 32]).expect("valid key")
    }

    /// Derives the address from the key's public point, independently of
    /// the recovery path.
    fn address_of(key: &SigningKey) -> Address {
        let point = key.verifying_key().to_encoded_point(false);
        let digest = keccak256(&point.as_bytes()[1..]);
        Address::from_slice(&digest[12..])
    }

    #[test]
    fn test_decode_example_transaction() {
        let tx = example_tx();

        assert_eq!(tx.nonce, U256::from(1));
        assert_eq!(tx.gas_price, U256::from(0x22ecb25c00u64));
        assert_eq!(tx.gas_limit, U256::from(21000));
        assert_eq!(
            tx.to,
            Some(Address::from_slice(
                &hex::decode("a090e606e30bd747d4e6245a1517ebe430f0057e").unwrap()
            ))
        );
        assert_eq!(tx.value, U256::from(0x0340c0086a5cbe00u64));
        assert!(tx.data.is_empty());
        assert_eq!(tx.v, 0x25);
        assert_eq!(tx.chain_id().expect("replay protected"), 1);
    }

    #[test]
    fn test_encode_roundtrip() {
        let raw = hex::decode(EXAMPLE_TX).expect("valid hex");
        assert_eq!(example_tx().encode(), raw);
    }

    #[test]
    fn test_example_sender_recovers() {
        let tx = example_tx();
        assert_eq!(
            tx.signing_hash(None).expect("should hash").as_slice(),
            &hex::decode("a327490da3e1f962dfc17c6937b252e65e2137bc1fa4b4312b76ee3d31b3aeee")
                .unwrap()[..]
        );
        let sender = tx.sender().expect("should recover");
        assert_eq!(
            sender,
            Address::from_slice(&hex::decode("bdd4903b8f2a8dc837288d0c50fae0f85816be6c").unwrap())
        );

        // pure function of the fields: a second call reproduces it
        assert_eq!(tx.sender().expect("should recover"), sender);
    }

    #[test]
    fn test_chain_id_both_parities() {
        for chain_id in [1u64, 111, 1337] {
            for parity in [0u64, 1] {
                let mut tx = example_tx();
                tx.v = 2 * chain_id + 35 + parity;
                assert_eq!(tx.chain_id().expect("replay protected"), chain_id);
            }
        }
    }

    #[test]
    fn test_legacy_v_has_no_chain_id() {
        for v in [0u64, 27, 28] {
            let mut tx = example_tx();
            tx.v = v;
            assert!(matches!(tx.chain_id(), Err(Error::InconsistentChainId { .. })));

            // still hashable with an explicit override
            tx.signing_hash(Some(1)).expect("legacy hashing should work");
        }
    }

    #[test]
    fn test_recovery_bit_parity_mapping() {
        let mut tx = example_tx();

        // odd v maps to recovery bit 0, even v to 1
        tx.v = 37;
        assert_eq!(tx.signature().expect("has signature").recovery_bit, 0);
        tx.v = 38;
        assert_eq!(tx.signature().expect("has signature").recovery_bit, 1);
    }

    #[test]
    fn test_signing_message_minimal_integers() {
        let tx = Transaction::new_unsigned(
            U256::ZERO,
            U256::ZERO,
            U256::ZERO,
            None,
            U256::ZERO,
            Vec::new(),
        );

        // every zero field is the empty string, chain id 1 a single byte
        assert_eq!(
            tx.signing_message(Some(1)).expect("should encode"),
            vec![0xc9, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01, 0x80, 0x80]
        );
    }

    #[test]
    fn test_sign_then_recover() {
        let key = signing_key();
        let expected = address_of(&key);

        let mut tx = Transaction::new_unsigned(
            U256::from(7),
            U256::from(1),
            U256::from(21000),
            Some(Address::repeat_byte(0x11)),
            U256::from(1),
            vec![0x39, 0x17, 0xb3, 0xdf],
        );
        tx.sign(&key, 111).expect("should sign");

        assert_eq!(tx.chain_id().expect("replay protected"), 111);
        assert!(tx.v == 2 * 111 + 35 || tx.v == 2 * 111 + 36);
        assert_eq!(tx.sender().expect("should recover"), expected);

        // the wire form survives a decode round-trip
        let decoded = Transaction::decode(&tx.encode()).expect("should decode");
        assert_eq!(decoded, tx);
        assert_eq!(decoded.sender().expect("should recover"), expected);
    }

    #[test]
    fn test_flipped_parity_changes_sender() {
        let key = signing_key();
        let expected = address_of(&key);

        let mut tx = Transaction::new_unsigned(
            U256::ZERO,
            U256::from(1),
            U256::from(21000),
            Some(Address::repeat_byte(0x22)),
            U256::ZERO,
            Vec::new(),
        );
        tx.sign(&key, 1).expect("should sign");

        // flipping the parity of v must not recover the same address
        tx.v ^= 1;
        match tx.sender() {
            Ok(address) => assert_ne!(address, expected),
            Err(Error::InvalidSignature(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_unsigned_has_no_sender() {
        let tx = Transaction::new_unsigned(
            U256::ZERO,
            U256::ZERO,
            U256::ZERO,
            None,
            U256::ZERO,
            Vec::new(),
        );
        assert!(matches!(tx.sender(), Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn test_execution_payload_layout() {
        let key = signing_key();
        let mut tx = Transaction::new_unsigned(
            U256::ZERO,
            U256::from(1),
            U256::from(21000),
            Some(Address::repeat_byte(0x33)),
            U256::ZERO,
            vec![0xca, 0xfe],
        );
        tx.sign(&key, 1).expect("should sign");

        let payload = tx.execution_payload().expect("should build");
        let message = tx.signing_message(None).expect("should encode");

        assert_eq!(payload.len(), 20 + 65 + message.len());
        assert_eq!(&payload[..20], address_of(&key).as_slice());
        assert_eq!(&payload[20..85], &tx.signature().expect("has signature").to_bytes()[..]);
        assert_eq!(&payload[85..], message);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        // 8 fields instead of 9
        let eight = loaderkit_rlp::encode(&Item::List(vec![Item::Empty; 8]));
        assert!(Transaction::decode(&eight).is_err());

        // not a list
        assert!(Transaction::decode(&[0x83, 1, 2, 3]).is_err());

        // trailing bytes after the tuple
        let mut raw = hex::decode(EXAMPLE_TX).expect("valid hex");
        raw.push(0x00);
        assert!(Transaction::decode(&raw).is_err());

        // 19-byte to field
        let mut fields = vec![Item::Empty; 9];
        fields[3] = Item::Bytes(vec![0x11; 19]);
        assert!(Transaction::decode(&loaderkit_rlp::encode(&Item::List(fields))).is_err());
    }
}
