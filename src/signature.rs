//! Schnorr signatures over Ristretto.
//!
//! A signature is a compact proof of knowledge of the secret key `x` behind a public key
//! `X = x * G`, made non-interactive over a Merlin transcript that has absorbed the signed field
//! elements. The same statement definition is shared by the signer and the verifier.

use core::fmt;

use curve25519_dalek::{
    constants::{RISTRETTO_BASEPOINT_COMPRESSED, RISTRETTO_BASEPOINT_POINT},
    ristretto::CompressedRistretto,
    RistrettoPoint, Scalar,
};
use group::Group;
use lox_zkp::{
    toolbox::{prover::Prover, verifier::Verifier, SchnorrCS},
    CompactProof, ProofError, Transcript,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::hash::bytes_to_fields;

const CONSTRAINTS_LABEL: &[u8] = b"zkattest::signature::constraints";

pub struct PrivateKey(Scalar);

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(RistrettoPoint);

#[derive(Clone, Serialize, Deserialize)]
pub struct Signature(CompactProof);

impl PrivateKey {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(Scalar::random(rng))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(RISTRETTO_BASEPOINT_POINT * self.0)
    }

    /// Sign a sequence of field elements under the given transcript label.
    pub fn sign(&self, label: &'static [u8], message: &[Scalar]) -> Signature {
        let mut transcript = Transcript::new(label);
        absorb_message(&mut transcript, message);
        let mut prover = Prover::new(CONSTRAINTS_LABEL, &mut transcript);

        let secret = prover.allocate_scalar(b"secret_key", self.0);
        let (base, _) = prover.allocate_point(b"basepoint", RISTRETTO_BASEPOINT_POINT);
        let (public, _) = prover.allocate_point(b"public_key", self.public_key().0);
        constrain_public_key(&mut prover, secret, base, public);

        Signature(prover.prove_compact())
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    /// Decode a compressed public key. The identity point is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let point = CompressedRistretto::from_slice(bytes).ok()?.decompress()?;
        match bool::from(point.is_identity()) {
            true => None,
            false => Some(Self(point)),
        }
    }

    /// The compressed encoding as two 128-bit field elements.
    pub fn to_fields(&self) -> [Scalar; 2] {
        bytes_to_fields(&self.to_bytes())
    }

    pub fn verify(
        &self,
        label: &'static [u8],
        message: &[Scalar],
        signature: &Signature,
    ) -> Result<(), ProofError> {
        let mut transcript = Transcript::new(label);
        absorb_message(&mut transcript, message);
        let mut verifier = Verifier::new(CONSTRAINTS_LABEL, &mut transcript);

        let secret = verifier.allocate_scalar(b"secret_key");
        let base = verifier.allocate_point(b"basepoint", RISTRETTO_BASEPOINT_COMPRESSED)?;
        let public = verifier.allocate_point(b"public_key", self.0.compress())?;
        constrain_public_key(&mut verifier, secret, base, public);

        verifier.verify_compact(&signature.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Signature(..)")
    }
}

impl Serialize for PublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        Self::from_bytes(&bytes).ok_or_else(|| D::Error::custom("invalid public key encoding"))
    }
}

fn absorb_message(transcript: &mut Transcript, message: &[Scalar]) {
    transcript.append_u64(b"message_len", message.len() as u64);
    for x in message {
        transcript.append_message(b"message_elem", x.as_bytes());
    }
}

// Constraint shared by signer and verifier: X = x * G.
fn constrain_public_key<CS: SchnorrCS>(
    cs: &mut CS,
    secret: CS::ScalarVar,
    base: CS::PointVar,
    public: CS::PointVar,
) {
    cs.constrain(public, vec![(secret, base)]);
}
