//! Codec for Filecoin account addresses.
//!
//! Converts between the canonical in-memory [`Address`] and its two wire
//! forms: the compact binary encoding carried inside signed protocol
//! messages and the human typed textual encoding with an embedded BLAKE2b
//! checksum. Both decoders treat their input as untrusted: malformed input
//! is reported through [`Error`], never through a panic.
//!
//! Reference: <https://spec.filecoin.io/appendix/address/>

mod payload;

pub use payload::{DelegatedAddress, Payload};

use std::{fmt, str::FromStr};

use blake2b_simd::Params;
use integer_encoding::VarInt;

/// Identifier for actors, includes builtin and initialized actors.
pub type ActorID = u64;

/// Hash length of payload for Secp256k1 and Actor addresses.
pub const PAYLOAD_HASH_LEN: usize = 20;

/// BLS public key length used for validation of BLS addresses.
pub const BLS_PUB_LEN: usize = 48;

/// Max length of f4 sub addresses.
pub const MAX_SUBADDRESS_LEN: usize = 54;

/// Length of the checksum appended to the textual form.
pub const CHECKSUM_HASH_LEN: usize = 4;

/// Length of an uncompressed SEC1 secp256k1 public key.
pub const SECP_PUB_LEN: usize = 65;

/// Network prefix of every textual address.
pub const PREFIX: char = 'f';

/// The actor ID of the Ethereum Address Manager singleton.
pub const ETHEREUM_ADDRESS_MANAGER_ACTOR_ID: ActorID = 10;

/// Longest possible textual address: prefix, protocol digit and the base32
/// body of a maximal f4 address (10 varint bytes, 54 subaddress bytes and
/// the 4 checksum bytes encode to 109 characters).
pub const MAX_ADDRESS_TEXT_LEN: usize = 111;

/// Alphabet of the textual payload body, RFC 4648 lower case without
/// padding.
const ADDRESS_ENCODER: base32::Alphabet = base32::Alphabet::Rfc4648Lower { padding: false };

/// Errors produced when decoding or constructing addresses. Malformed
/// input is an expected outcome for this codec, not a fault.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The protocol byte or textual protocol digit is outside `0..=4`.
    #[error("unknown address protocol: {0}")]
    UnknownProtocol(u8),

    #[error("address does not start with the network prefix '{PREFIX}'")]
    InvalidPrefix,

    /// Payload length does not satisfy the protocol invariant: 0 for f0,
    /// 20 for f1 and f2, 48 for f3, at most 54 for f4.
    #[error("invalid payload length for {protocol:?}: {length}")]
    InvalidPayloadLength { protocol: Protocol, length: usize },

    #[error("invalid secp256k1 public key length: {0}")]
    InvalidPublicKeyLength(usize),

    /// Actor id varint is truncated or does not terminate within bounds.
    #[error("invalid or truncated actor id varint")]
    InvalidVarInt,

    /// Textual f0 body is not a decimal `u64` numeral.
    #[error("actor id is not a decimal numeral")]
    InvalidActorId,

    /// Recomputed checksum differs from the embedded one.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Textual body contains characters outside the lower case base32
    /// alphabet or is not the canonical encoding of its bytes.
    #[error("invalid base32 in address body")]
    InvalidBase32,

    #[error("address length {0} out of bounds")]
    InvalidLength(usize),
}

/// Protocol discriminant of an address: the leading byte of the binary
/// form and the digit following the prefix in the textual form.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Protocol {
    Id = 0,
    Secp256k1 = 1,
    Actor = 2,
    Bls = 3,
    Delegated = 4,
}

impl Protocol {
    /// Maps a protocol byte back to the discriminant. Anything outside
    /// `0..=4` is rejected rather than guessed.
    fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            0 => Ok(Protocol::Id),
            1 => Ok(Protocol::Secp256k1),
            2 => Ok(Protocol::Actor),
            3 => Ok(Protocol::Bls),
            4 => Ok(Protocol::Delegated),
            other => Err(Error::UnknownProtocol(other)),
        }
    }

    /// ASCII digit used in the textual form.
    fn ascii(self) -> char {
        (b'0' + self as u8) as char
    }
}

/// A Filecoin account address.
///
/// An address is an immutable value produced only by the decode and
/// construct operations of this crate. Two addresses are equal when their
/// protocol, actor id and payload are equal.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address {
    payload: Payload,
}

impl Address {
    /// Creates an ID (f0) address for an actor.
    pub fn new_id(id: ActorID) -> Self {
        Self {
            payload: Payload::Id(id),
        }
    }

    /// Creates a Secp256k1 (f1) address from an uncompressed SEC1 public
    /// key by hashing it down to [`PAYLOAD_HASH_LEN`] bytes.
    pub fn new_secp256k1(pubkey: &[u8]) -> Result<Self, Error> {
        if pubkey.len() != SECP_PUB_LEN {
            return Err(Error::InvalidPublicKeyLength(pubkey.len()));
        }
        Ok(Self {
            payload: Payload::Secp256k1(address_hash(pubkey)),
        })
    }

    /// Creates a BLS (f3) address. The 48 byte public key is the payload.
    pub fn new_bls(pubkey: &[u8]) -> Result<Self, Error> {
        let payload = pubkey.try_into().map_err(|_| Error::InvalidPayloadLength {
            protocol: Protocol::Bls,
            length: pubkey.len(),
        })?;
        Ok(Self {
            payload: Payload::Bls(payload),
        })
    }

    /// Creates a Delegated (f4) address under an explicit namespace actor.
    /// The subaddress is bounded by [`MAX_SUBADDRESS_LEN`] bytes.
    pub fn new_delegated(namespace: ActorID, subaddress: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            payload: Payload::Delegated(DelegatedAddress::new(namespace, subaddress)?),
        })
    }

    /// Creates a Delegated (f4) address for an uncompressed secp256k1
    /// public key under the Ethereum Address Manager namespace.
    pub fn delegated_from_pubkey(pubkey: &[u8]) -> Result<Self, Error> {
        if pubkey.len() != SECP_PUB_LEN {
            return Err(Error::InvalidPublicKeyLength(pubkey.len()));
        }
        Self::new_delegated(ETHEREUM_ADDRESS_MANAGER_ACTOR_ID, &address_hash(pubkey))
    }

    /// Protocol of the address.
    pub fn protocol(&self) -> Protocol {
        self.payload.protocol()
    }

    /// Address payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Actor id carried by the address: the identifier of an f0 address or
    /// the namespace actor of an f4 address.
    pub fn id(&self) -> Option<ActorID> {
        match self.payload {
            Payload::Id(id) => Some(id),
            Payload::Delegated(delegated) => Some(delegated.namespace()),
            _ => None,
        }
    }

    /// Decodes the compact binary wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (&protocol, rest) = bytes.split_first().ok_or(Error::InvalidLength(0))?;

        let payload = match Protocol::from_byte(protocol)? {
            Protocol::Id => {
                let (id, read) = u64::decode_var(rest).ok_or(Error::InvalidVarInt)?;
                // An f0 address is the varint alone, trailing bytes are a
                // payload length violation.
                if read != rest.len() {
                    return Err(Error::InvalidPayloadLength {
                        protocol: Protocol::Id,
                        length: rest.len() - read,
                    });
                }
                Payload::Id(id)
            }
            Protocol::Secp256k1 => {
                Payload::Secp256k1(rest.try_into().map_err(|_| Error::InvalidPayloadLength {
                    protocol: Protocol::Secp256k1,
                    length: rest.len(),
                })?)
            }
            Protocol::Actor => {
                Payload::Actor(rest.try_into().map_err(|_| Error::InvalidPayloadLength {
                    protocol: Protocol::Actor,
                    length: rest.len(),
                })?)
            }
            Protocol::Bls => {
                Payload::Bls(rest.try_into().map_err(|_| Error::InvalidPayloadLength {
                    protocol: Protocol::Bls,
                    length: rest.len(),
                })?)
            }
            Protocol::Delegated => {
                let (namespace, read) = u64::decode_var(rest).ok_or(Error::InvalidVarInt)?;
                Payload::Delegated(DelegatedAddress::new(namespace, &rest[read..])?)
            }
        };

        Ok(Self { payload })
    }

    /// Encodes the compact binary wire form: protocol byte, actor id
    /// varint where the protocol carries one, then the payload. The
    /// checksum belongs only to the textual form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + u64::MAX.required_space() + MAX_SUBADDRESS_LEN);
        bytes.push(self.protocol() as u8);
        match &self.payload {
            Payload::Id(id) => write_varint(&mut bytes, *id),
            Payload::Secp256k1(hash) | Payload::Actor(hash) => bytes.extend_from_slice(hash),
            Payload::Bls(key) => bytes.extend_from_slice(key),
            Payload::Delegated(delegated) => {
                write_varint(&mut bytes, delegated.namespace());
                bytes.extend_from_slice(delegated.subaddress());
            }
        }
        bytes
    }

    /// Checks whether `bytes` decode to a valid address.
    pub fn is_valid_bytes(bytes: &[u8]) -> bool {
        Self::from_bytes(bytes).is_ok()
    }

    /// Checks whether `s` parses as a valid textual address.
    pub fn is_valid_str(s: &str) -> bool {
        Self::from_str(s).is_ok()
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parses the textual wire form and validates the embedded checksum.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Both bounds matter: the lower one guarantees a prefix and a
        // protocol digit exist, the upper one keeps decode work
        // proportional to what a real address can occupy.
        if s.len() < 3 || s.len() > MAX_ADDRESS_TEXT_LEN {
            return Err(Error::InvalidLength(s.len()));
        }

        let rest = s.strip_prefix(PREFIX).ok_or(Error::InvalidPrefix)?;
        let digit = rest.as_bytes()[0];
        if !digit.is_ascii_digit() {
            return Err(Error::UnknownProtocol(digit));
        }
        let protocol = Protocol::from_byte(digit - b'0')?;
        let body = &rest[1..];

        let payload = match protocol {
            Protocol::Id => {
                // An f0 address is self validating, its body is the plain
                // decimal actor id and no checksum is carried.
                if body.len() > 20 || !body.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::InvalidActorId);
                }
                Payload::Id(body.parse::<u64>().map_err(|_| Error::InvalidActorId)?)
            }
            Protocol::Secp256k1 => {
                let raw = decode_checksummed(protocol, body)?;
                Payload::Secp256k1(raw.as_slice().try_into().map_err(|_| {
                    Error::InvalidPayloadLength {
                        protocol,
                        length: raw.len(),
                    }
                })?)
            }
            Protocol::Actor => {
                let raw = decode_checksummed(protocol, body)?;
                Payload::Actor(raw.as_slice().try_into().map_err(|_| {
                    Error::InvalidPayloadLength {
                        protocol,
                        length: raw.len(),
                    }
                })?)
            }
            Protocol::Bls => {
                let raw = decode_checksummed(protocol, body)?;
                Payload::Bls(raw.as_slice().try_into().map_err(|_| {
                    Error::InvalidPayloadLength {
                        protocol,
                        length: raw.len(),
                    }
                })?)
            }
            Protocol::Delegated => {
                let raw = decode_checksummed(protocol, body)?;
                let (namespace, read) = u64::decode_var(&raw).ok_or(Error::InvalidVarInt)?;
                Payload::Delegated(DelegatedAddress::new(namespace, &raw[read..])?)
            }
        };

        Ok(Self { payload })
    }
}

impl fmt::Display for Address {
    /// Formats the textual wire form: prefix, protocol digit and the
    /// protocol specific body.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PREFIX, self.protocol().ascii())?;
        match &self.payload {
            Payload::Id(id) => write!(f, "{}", id),
            _ => {
                let bytes = self.to_bytes();
                let mut body = bytes[1..].to_vec();
                body.extend_from_slice(&checksum(&bytes));
                f.write_str(&base32::encode(ADDRESS_ENCODER, &body))
            }
        }
    }
}

/// Decodes the base32 body of a checksummed textual address and validates
/// the embedded checksum, returning the raw bytes in front of it. The
/// checksum covers the binary wire form: for f4 the raw bytes already start
/// with the namespace varint, mirroring `to_bytes`.
fn decode_checksummed(protocol: Protocol, body: &str) -> Result<Vec<u8>, Error> {
    if !body.bytes().all(|b| matches!(b, b'a'..=b'z' | b'2'..=b'7')) {
        return Err(Error::InvalidBase32);
    }
    let mut decoded = base32::decode(ADDRESS_ENCODER, body).ok_or(Error::InvalidBase32)?;
    // The decoder tolerates non canonical spellings (odd lengths and non
    // zero trailing bits decode to the same bytes). Require the canonical
    // encoding so every address has exactly one spelling and every
    // corrupted character is caught.
    if base32::encode(ADDRESS_ENCODER, &decoded) != body {
        return Err(Error::InvalidBase32);
    }

    let split = decoded
        .len()
        .checked_sub(CHECKSUM_HASH_LEN)
        .ok_or(Error::InvalidPayloadLength {
            protocol,
            length: decoded.len(),
        })?;
    let (raw, embedded) = decoded.split_at(split);

    let mut ingest = Vec::with_capacity(1 + raw.len());
    ingest.push(protocol as u8);
    ingest.extend_from_slice(raw);
    if embedded != checksum(&ingest) {
        return Err(Error::ChecksumMismatch);
    }

    decoded.truncate(split);
    Ok(decoded)
}

/// Appends the LEB128 encoding of `value` to `out`.
fn write_varint(out: &mut Vec<u8>, value: u64) {
    let mut buf = [0u8; 10];
    let written = value.encode_var(&mut buf);
    out.extend_from_slice(&buf[..written]);
}

/// 4 byte BLAKE2b checksum embedded in the textual form, computed over the
/// binary wire form (protocol byte included).
fn checksum(ingest: &[u8]) -> [u8; CHECKSUM_HASH_LEN] {
    let hash = Params::new().hash_length(CHECKSUM_HASH_LEN).hash(ingest);
    hash.as_bytes()
        .try_into()
        .expect("hash output has the configured length")
}

/// 20 byte BLAKE2b digest used to derive key based payloads.
fn address_hash(ingest: &[u8]) -> [u8; PAYLOAD_HASH_LEN] {
    let hash = Params::new().hash_length(PAYLOAD_HASH_LEN).hash(ingest);
    hash.as_bytes()
        .try_into()
        .expect("hash output has the configured length")
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::str::FromStr;

    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    use crate::Address;

    /// Human readable formats carry the textual form, binary formats the
    /// compact wire form.
    impl Serialize for Address {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if serializer.is_human_readable() {
                serializer.collect_str(self)
            } else {
                serializer.serialize_bytes(&self.to_bytes())
            }
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            if deserializer.is_human_readable() {
                let s = String::deserialize(deserializer)?;
                Address::from_str(&s).map_err(de::Error::custom)
            } else {
                let bytes = Vec::<u8>::deserialize(deserializer)?;
                Address::from_bytes(&bytes).map_err(de::Error::custom)
            }
        }
    }
}
