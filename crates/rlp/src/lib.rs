//! Recursive length-prefixed (RLP) encoding and decoding.
//!
//! This crate implements the structural codec used by Ethereum-style
//! transactions: nested trees of byte strings and lists, each prefixed
//! with a single tag byte and an optional big-endian length. The codec
//! has no knowledge of any higher-level shape; it round-trips arbitrary
//! [`Item`] trees.

/// Error types for the RLP codec
pub mod error;

use crate::error::Error;

/// Offset added to the length of a short byte string (<= 55 bytes).
const SHORT_STRING: u8 = 0x80;

/// Offset added to the length-of-length of a long byte string.
const LONG_STRING: u8 = 0xb7;

/// Offset added to the payload length of a short list (<= 55 bytes).
const SHORT_LIST: u8 = 0xc0;

/// Offset added to the length-of-length of a long list.
const LONG_LIST: u8 = 0xf7;

/// Maximum payload length representable with a single tag byte.
const MAX_SHORT_LEN: usize = 55;

/// A node in an RLP byte-string tree.
///
/// [`Item::Empty`] is the null value: it encodes to the bare `0x80` tag,
/// exactly like a zero-length byte string, and is what the decoder
/// returns for that tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// The null value, encoded as a single `0x80` byte.
    Empty,
    /// An opaque byte string.
    Bytes(Vec<u8>),
    /// An ordered list of child items.
    List(Vec<Item>),
}

impl Item {
    /// Returns the payload bytes of this item, treating [`Item::Empty`]
    /// as a zero-length string. Returns `None` for lists.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Item::Empty => Some(&[]),
            Item::Bytes(bytes) => Some(bytes),
            Item::List(_) => None,
        }
    }

    /// Returns the children of this item, or `None` if it is not a list.
    pub fn as_list(&self) -> Option<&[Item]> {
        match self {
            Item::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for Item {
    fn from(bytes: Vec<u8>) -> Self {
        Item::Bytes(bytes)
    }
}

impl From<&[u8]> for Item {
    fn from(bytes: &[u8]) -> Self {
        Item::Bytes(bytes.to_vec())
    }
}

/// Encodes an [`Item`] tree into its canonical RLP byte representation.
///
/// ```
/// use loaderkit_rlp::{encode, Item};
///
/// let item = Item::Bytes(b"dog".to_vec());
/// assert_eq!(encode(&item), vec![0x83, b'd', b'o', b'g']);
/// ```
pub fn encode(item: &Item) -> Vec<u8> {
    match item {
        Item::Empty => vec![SHORT_STRING],
        Item::Bytes(bytes) => {
            // a single byte below 0x80 is its own encoding
            if bytes.len() == 1 && bytes[0] < SHORT_STRING {
                return bytes.clone();
            }

            let mut out = length_prefix(bytes.len(), SHORT_STRING);
            out.extend_from_slice(bytes);
            out
        }
        Item::List(items) => {
            let payload = items.iter().flat_map(encode).collect::<Vec<u8>>();
            let mut out = length_prefix(payload.len(), SHORT_LIST);
            out.extend_from_slice(&payload);
            out
        }
    }
}

/// Decodes a single [`Item`] from the front of `input`, returning the
/// item together with the unconsumed remainder of the input.
///
/// Fails with [`Error::MalformedEncoding`] if the input is shorter than
/// any declared length, or if a list payload does not partition exactly
/// into whole child items.
///
/// ```
/// use loaderkit_rlp::{decode, Item};
///
/// let (item, rest) = decode(&[0x83, b'c', b'a', b't', 0xff]).expect("should decode");
/// assert_eq!(item, Item::Bytes(b"cat".to_vec()));
/// assert_eq!(rest, &[0xff]);
/// ```
pub fn decode(input: &[u8]) -> Result<(Item, &[u8]), Error> {
    let (&tag, rest) = input
        .split_first()
        .ok_or_else(|| Error::MalformedEncoding("unexpected end of input".to_string()))?;

    match tag {
        // a byte below 0x80 is its own single-byte string
        0x00..=0x7f => Ok((Item::Bytes(vec![tag]), rest)),
        0x80 => Ok((Item::Empty, rest)),
        0x81..=0xb7 => {
            let (payload, rest) = take(rest, (tag - SHORT_STRING) as usize)?;
            Ok((Item::Bytes(payload.to_vec()), rest))
        }
        0xb8..=0xbf => {
            let (len, rest) = read_length(rest, (tag - LONG_STRING) as usize)?;
            let (payload, rest) = take(rest, len)?;
            Ok((Item::Bytes(payload.to_vec()), rest))
        }
        0xc0 => Ok((Item::List(Vec::new()), rest)),
        0xc1..=0xf7 => decode_list(rest, (tag - SHORT_LIST) as usize),
        0xf8..=0xff => {
            let (len, rest) = read_length(rest, (tag - LONG_LIST) as usize)?;
            decode_list(rest, len)
        }
    }
}

/// Builds the tag byte (and big-endian length, for payloads longer than
/// 55 bytes) for a payload of `len` bytes at the given base offset.
fn length_prefix(len: usize, offset: u8) -> Vec<u8> {
    if len <= MAX_SHORT_LEN {
        return vec![offset + len as u8];
    }

    let be = len.to_be_bytes();
    let first = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
    let length_bytes = &be[first..];

    let mut out = Vec::with_capacity(1 + length_bytes.len());
    out.push(offset + MAX_SHORT_LEN as u8 + length_bytes.len() as u8);
    out.extend_from_slice(length_bytes);
    out
}

/// Reads a big-endian length of `width` bytes from the front of `input`.
fn read_length(input: &[u8], width: usize) -> Result<(usize, &[u8]), Error> {
    let (length_bytes, rest) = take(input, width)?;
    let mut len = 0usize;
    for byte in length_bytes {
        len = len
            .checked_mul(256)
            .and_then(|l| l.checked_add(*byte as usize))
            .ok_or_else(|| Error::MalformedEncoding("declared length overflows".to_string()))?;
    }
    Ok((len, rest))
}

/// Splits `len` bytes off the front of `input`, failing if the input is
/// too short for the declared length.
fn take(input: &[u8], len: usize) -> Result<(&[u8], &[u8]), Error> {
    if input.len() < len {
        return Err(Error::MalformedEncoding(format!(
            "declared length {} exceeds remaining input of {} bytes",
            len,
            input.len()
        )));
    }
    Ok(input.split_at(len))
}

/// Decodes list children from a payload of exactly `payload_len` bytes.
/// The payload must partition into whole child items.
fn decode_list(input: &[u8], payload_len: usize) -> Result<(Item, &[u8]), Error> {
    let (mut payload, rest) = take(input, payload_len)?;

    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, remainder) = decode(payload)?;
        items.push(item);
        payload = remainder;
    }

    Ok((Item::List(items), rest))
}
