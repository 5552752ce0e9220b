//! Canonical hashing into the scalar field.
//!
//! All inputs are absorbed through an injective encoding: every variable-length item is
//! length-prefixed and every typed value carries a tag for its type. Two values hash to the same
//! field element only if they are structurally identical.

use blake2::Blake2b512;
use curve25519_dalek::Scalar;
use digest::Digest;
use sha3::Keccak256;

use crate::{
    domain,
    value::{DataType, Value},
};

#[derive(Clone)]
pub struct FieldHasher(Blake2b512);

impl FieldHasher {
    pub fn new(domain: &str) -> Self {
        let mut hasher = Self(Blake2b512::new());
        hasher.bytes(domain.as_bytes());
        hasher
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update((bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
        self
    }

    pub fn field(&mut self, x: &Scalar) -> &mut Self {
        self.0.update(x.as_bytes());
        self
    }

    pub fn fields<'a>(&mut self, xs: impl IntoIterator<Item = &'a Scalar>) -> &mut Self {
        for x in xs {
            self.field(x);
        }
        self
    }

    fn tag(&mut self, tag: u8) -> &mut Self {
        self.0.update([tag]);
        self
    }

    fn count(&mut self, n: usize) -> &mut Self {
        self.0.update((n as u64).to_le_bytes());
        self
    }

    pub fn data_type(&mut self, data_type: &DataType) -> &mut Self {
        match data_type {
            DataType::Undefined => self.tag(0),
            DataType::Bool => self.tag(1),
            DataType::Field => self.tag(2),
            DataType::UInt8 => self.tag(3),
            DataType::UInt32 => self.tag(4),
            DataType::UInt64 => self.tag(5),
            DataType::String => self.tag(6),
            DataType::Bytes => self.tag(7),
            DataType::PublicKey => self.tag(8),
            DataType::Array(inner) => self.tag(9).data_type(inner),
            DataType::Record(fields) => {
                self.tag(10).count(fields.len());
                for (key, t) in fields {
                    self.bytes(key.as_bytes()).data_type(t);
                }
                self
            }
            DataType::Credential(data) => self.tag(11).data_type(data),
        }
    }

    pub fn value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Undefined => self.tag(0),
            Value::Bool(b) => self.tag(1).tag(u8::from(*b)),
            Value::Field(x) => self.tag(2).field(x),
            Value::UInt8(x) => self.tag(3).tag(*x),
            Value::UInt32(x) => {
                self.tag(4);
                self.0.update(x.to_le_bytes());
                self
            }
            Value::UInt64(x) => {
                self.tag(5);
                self.0.update(x.to_le_bytes());
                self
            }
            Value::String(s) => self.tag(6).bytes(s.as_bytes()),
            Value::Bytes(b) => self.tag(7).bytes(b),
            Value::PublicKey(pk) => self.tag(8).bytes(pk.to_bytes().as_slice()),
            Value::Array { element, items } => {
                self.tag(9).data_type(element).count(items.len());
                for item in items {
                    self.value(item);
                }
                self
            }
            Value::Record(fields) => {
                self.tag(10).count(fields.len());
                for (key, v) in fields {
                    self.bytes(key.as_bytes()).value(v);
                }
                self
            }
            Value::Credential(c) => {
                let hash = c.credential.hash();
                self.tag(11).field(&hash).field(&c.issuer)
            }
        }
    }

    pub fn finalize(self) -> Scalar {
        Scalar::from_hash(self.0)
    }
}

/// Hash a sequence of field elements under the given domain.
pub fn hash_fields<'a>(domain: &str, xs: impl IntoIterator<Item = &'a Scalar>) -> Scalar {
    let mut hasher = FieldHasher::new(domain);
    hasher.fields(xs);
    hasher.finalize()
}

/// Canonical hash of an arbitrary typed value.
pub fn hash_value(value: &Value) -> Scalar {
    hash_values(domain::VALUE, [value])
}

/// Canonical hash of a list of typed values under the given domain.
pub fn hash_values<'a>(domain: &str, values: impl IntoIterator<Item = &'a Value>) -> Scalar {
    let mut hasher = FieldHasher::new(domain);
    for value in values {
        hasher.value(value);
    }
    hasher.finalize()
}

/// Split 32 bytes into two field elements of 128 bits each, without any reduction.
pub fn bytes_to_fields(bytes: &[u8; 32]) -> [Scalar; 2] {
    let mut low = [0u8; 32];
    let mut high = [0u8; 32];
    low[..16].copy_from_slice(&bytes[..16]);
    high[..16].copy_from_slice(&bytes[16..]);
    [Scalar::from_bytes_mod_order(low), Scalar::from_bytes_mod_order(high)]
}

/// Keccak-256 of a free-form string, as two field elements.
///
/// Used to bind identifiers that live outside the proof system, such as a verifier's domain name
/// or an HTTP action, without hashing them with the field-native hash.
pub fn keccak_fields(input: &str) -> [Scalar; 2] {
    let digest: [u8; 32] = Keccak256::digest(input.as_bytes()).into();
    bytes_to_fields(&digest)
}
