//! Proving backends.
//!
//! A backend turns a [Spec] into a program identified by a [VerificationKey], produces proofs that
//! the program accepted some private input, and verifies those proofs against public inputs.
//!
//! [TransparentBackend] is the reference backend. Its verification key carries the serialized
//! spec, and its proofs carry the private input in the clear; verification re-runs the program.
//! It is sound, but neither hiding nor succinct.

use std::collections::BTreeMap;

use curve25519_dalek::Scalar;
use serde::{Deserialize, Serialize};

use crate::{
    credential::StoredCredential,
    domain,
    error::Error,
    hash::FieldHasher,
    program::Program,
    serialize::{self, field_hex},
    signature::{PublicKey, Signature},
    spec::Spec,
    value::Value,
};

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("constraint unsatisfied: {0}")]
    ConstraintUnsatisfied(String),
    #[error("proof is invalid: {0}")]
    InvalidProof(String),
    #[error("verification key does not match its program")]
    InvalidVerificationKey,
    #[error("request was compiled by the {compiled} backend, not {requested}")]
    BackendMismatch {
        compiled: &'static str,
        requested: &'static str,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationKey {
    #[serde(with = "field_hex")]
    pub hash: Scalar,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof(#[serde(with = "hex::serde")] pub Vec<u8>);

/// Inputs known to both prover and verifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicInput {
    #[serde(with = "field_hex")]
    pub context: Scalar,
    pub claims: Value,
}

/// Inputs known only to the prover.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PrivateInput {
    pub owner: PublicKey,
    pub owner_signature: Signature,
    pub credentials: BTreeMap<String, StoredCredential>,
}

/// A proof together with the public values it was made for, as carried by a recursive
/// credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NestedProof {
    pub public_input: PublicInput,
    pub public_output: Value,
    pub proof: Proof,
}

pub trait Backend: Send + Sync {
    /// Name of the proving system. Keys and proofs of different backends are not interchangeable.
    fn id(&self) -> &'static str;

    /// Compile a spec into a program. Must be deterministic.
    fn compile(&self, spec: &Spec) -> Result<VerificationKey, Error>;

    /// Run the program behind `vk`, returning its output and a proof of the run.
    ///
    /// An assertion that evaluates to false is reported as
    /// [BackendError::ConstraintUnsatisfied].
    fn prove(
        &self,
        vk: &VerificationKey,
        public_input: &PublicInput,
        private_input: &PrivateInput,
    ) -> Result<(Value, Proof), Error>;

    fn verify(
        &self,
        vk: &VerificationKey,
        public_input: &PublicInput,
        public_output: &Value,
        proof: &Proof,
    ) -> Result<(), Error>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TransparentBackend;

impl TransparentBackend {
    fn program(&self, vk: &VerificationKey) -> Result<Program, Error> {
        let hash = vk_hash(&vk.data);
        if hash != vk.hash {
            return Err(BackendError::InvalidVerificationKey.into());
        }
        let spec = serialize::spec_from_json(&serde_json::from_str(&vk.data)?)?;
        Ok(Program::new(spec))
    }
}

fn vk_hash(data: &str) -> Scalar {
    let mut hasher = FieldHasher::new(domain::VERIFICATION_KEY);
    hasher.bytes(data.as_bytes());
    hasher.finalize()
}

impl Backend for TransparentBackend {
    fn id(&self) -> &'static str {
        "transparent"
    }

    fn compile(&self, spec: &Spec) -> Result<VerificationKey, Error> {
        let data = serde_json::to_string(&serialize::spec_to_json(spec)?)?;
        tracing::debug!(bytes = data.len(), "compiled transparent program");
        Ok(VerificationKey {
            hash: vk_hash(&data),
            data,
        })
    }

    fn prove(
        &self,
        vk: &VerificationKey,
        public_input: &PublicInput,
        private_input: &PrivateInput,
    ) -> Result<(Value, Proof), Error> {
        let output = self.program(vk)?.run(self, public_input, private_input)?;
        let proof = Proof(serde_json::to_vec(private_input)?);
        Ok((output, proof))
    }

    fn verify(
        &self,
        vk: &VerificationKey,
        public_input: &PublicInput,
        public_output: &Value,
        proof: &Proof,
    ) -> Result<(), Error> {
        let program = self.program(vk)?;
        let private_input: PrivateInput = serde_json::from_slice(&proof.0)
            .map_err(|e| BackendError::InvalidProof(e.to_string()))?;
        let output = program
            .run(self, public_input, &private_input)
            .map_err(|e| BackendError::InvalidProof(e.to_string()))?;
        match &output == public_output {
            true => Ok(()),
            false => Err(BackendError::InvalidProof("output does not match".into()).into()),
        }
    }
}
