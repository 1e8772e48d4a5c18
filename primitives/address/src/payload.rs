use crate::{ActorID, Error, Protocol, BLS_PUB_LEN, MAX_SUBADDRESS_LEN, PAYLOAD_HASH_LEN};

/// A "delegated" (f4) address: a namespace actor plus a subaddress of at
/// most [`MAX_SUBADDRESS_LEN`] bytes.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DelegatedAddress {
    namespace: ActorID,
    length: usize,
    buffer: [u8; MAX_SUBADDRESS_LEN],
}

impl DelegatedAddress {
    /// Creates a new delegated address. The unused tail of the backing
    /// buffer is zero filled so the derived equality and hashing stay
    /// structural. A zero length subaddress is a legitimate address, the
    /// bound is an upper one only.
    pub fn new(namespace: ActorID, subaddress: &[u8]) -> Result<Self, Error> {
        let length = subaddress.len();
        if length > MAX_SUBADDRESS_LEN {
            return Err(Error::InvalidPayloadLength {
                protocol: Protocol::Delegated,
                length,
            });
        }

        let mut buffer = [0u8; MAX_SUBADDRESS_LEN];
        buffer[..length].copy_from_slice(subaddress);
        Ok(Self {
            namespace,
            length,
            buffer,
        })
    }

    /// The namespace actor the subaddress lives under.
    pub fn namespace(&self) -> ActorID {
        self.namespace
    }

    /// The namespace relative subaddress.
    pub fn subaddress(&self) -> &[u8] {
        &self.buffer[..self.length]
    }
}

/// Payload is the data of the [`Address`](crate::Address). Variants are the
/// supported address protocols.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Payload {
    /// f0: ID protocol address.
    Id(ActorID),
    /// f1: SECP256K1 key address, 20 byte hash of the public key.
    Secp256k1([u8; PAYLOAD_HASH_LEN]),
    /// f2: Actor protocol address, 20 byte hash of actor data.
    Actor([u8; PAYLOAD_HASH_LEN]),
    /// f3: BLS key address, full 48 byte public key.
    Bls([u8; BLS_PUB_LEN]),
    /// f4: Delegated address, a namespace with an arbitrary subaddress.
    Delegated(DelegatedAddress),
}

impl Payload {
    /// Protocol the payload belongs to.
    pub fn protocol(&self) -> Protocol {
        match self {
            Payload::Id(_) => Protocol::Id,
            Payload::Secp256k1(_) => Protocol::Secp256k1,
            Payload::Actor(_) => Protocol::Actor,
            Payload::Bls(_) => Protocol::Bls,
            Payload::Delegated(_) => Protocol::Delegated,
        }
    }
}
