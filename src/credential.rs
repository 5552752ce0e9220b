//! Credentials, the witnesses that vouch for them, and the three credential kinds.
//!
//! A [Credential] is owner-bound data. Whoever vouches for it leaves a [Witness]: an issuer
//! signature for native credentials, a proof for recursive credentials, or nothing at all for
//! unsigned ones. A [CredentialSpec] is the input-side description of a credential kind, used by a
//! spec to say which credentials it accepts.

use core::fmt;

use curve25519_dalek::Scalar;
use serde::{Deserialize, Serialize};

use crate::{
    backend::{Backend, NestedProof, VerificationKey},
    domain,
    error::Error,
    hash::{hash_fields, hash_value, hash_values},
    signature::{PrivateKey, PublicKey, Signature},
    value::{DataType, Value},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credential {
    pub owner: PublicKey,
    pub data: Value,
}

impl Credential {
    pub fn new(owner: PublicKey, data: impl Into<Value>) -> Self {
        Self {
            owner,
            data: data.into(),
        }
    }

    /// Canonical hash binding the owner to the data.
    pub fn hash(&self) -> Scalar {
        let owner = hash_fields(domain::OWNER, &self.owner.to_fields());
        hash_fields(domain::CREDENTIAL, [&owner, &hash_value(&self.data)])
    }

    /// The credential as a record `{owner, data}`, the shape a presentation outputs to mint a
    /// recursive credential.
    pub fn to_value(&self) -> Value {
        Value::record([
            ("data", self.data.clone()),
            ("owner", Value::PublicKey(self.owner)),
        ])
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Record(fields) = value else {
            return None;
        };
        if fields.len() != 2 {
            return None;
        }
        match (fields.get("owner"), fields.get("data")) {
            (Some(Value::PublicKey(owner)), Some(data)) => Some(Self {
                owner: *owner,
                data: data.clone(),
            }),
            _ => None,
        }
    }

    /// Issue a native credential, signing its hash with the issuer key.
    pub fn sign(self, issuer: &PrivateKey) -> StoredCredential {
        let issuer_signature = issuer.sign(domain::ISSUER_SIGNATURE, &[self.hash()]);
        tracing::debug!(owner = %self.owner, "issued native credential");
        StoredCredential {
            version: Version::V0,
            witness: Witness::Native {
                issuer: issuer.public_key(),
                issuer_signature,
            },
            metadata: None,
            credential: self,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKind {
    Native,
    Recursive,
    Unsigned,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialKind::Native => "native",
            CredentialKind::Recursive => "recursive",
            CredentialKind::Unsigned => "unsigned",
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    deny_unknown_fields
)]
pub enum Witness {
    Native {
        issuer: PublicKey,
        issuer_signature: Signature,
    },
    Recursive {
        vk: VerificationKey,
        proof: NestedProof,
    },
    Unsigned,
}

impl Witness {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Witness::Native { .. } => CredentialKind::Native,
            Witness::Recursive { .. } => CredentialKind::Recursive,
            Witness::Unsigned => CredentialKind::Unsigned,
        }
    }

    /// Canonical identity of whoever vouches for the credential.
    pub fn issuer(&self) -> Scalar {
        match self {
            Witness::Native { issuer, .. } => {
                hash_fields(domain::ISSUER_NATIVE, &issuer.to_fields())
            }
            Witness::Recursive { vk, proof } => {
                let public_input = hash_values(
                    domain::PUBLIC_INPUT,
                    [
                        &Value::Field(proof.public_input.context),
                        &proof.public_input.claims,
                    ],
                );
                hash_fields(domain::ISSUER_RECURSIVE, [&vk.hash, &public_input])
            }
            Witness::Unsigned => Scalar::ZERO,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("a {found} witness cannot back a {expected} credential")]
    WitnessMismatch {
        expected: CredentialKind,
        found: CredentialKind,
    },
    #[error("nested proof was made for a different verification key")]
    VerificationKeyMismatch,
    #[error("credential data has type {found:?}, expected {expected:?}")]
    DataType { expected: DataType, found: DataType },
    #[error("issuer signature is invalid")]
    InvalidSignature,
    #[error("nested proof is invalid: {0}")]
    InvalidNestedProof(String),
    #[error("nested proof output is not this credential")]
    OutputMismatch,
}

/// The accepted kind and data shape of a credential input.
#[derive(Clone, Debug, PartialEq)]
pub enum CredentialSpec {
    Native { data: DataType },
    Recursive { vk_hash: Scalar, data: DataType },
    Unsigned { data: DataType },
}

impl CredentialSpec {
    pub fn native(data: DataType) -> Self {
        Self::Native { data }
    }

    /// Credentials minted from presentations of the program behind `vk`.
    pub fn recursive(vk: &VerificationKey, data: DataType) -> Self {
        Self::Recursive {
            vk_hash: vk.hash,
            data,
        }
    }

    pub fn unsigned(data: DataType) -> Self {
        Self::Unsigned { data }
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            CredentialSpec::Native { .. } => CredentialKind::Native,
            CredentialSpec::Recursive { .. } => CredentialKind::Recursive,
            CredentialSpec::Unsigned { .. } => CredentialKind::Unsigned,
        }
    }

    pub fn data_type(&self) -> &DataType {
        match self {
            CredentialSpec::Native { data }
            | CredentialSpec::Recursive { data, .. }
            | CredentialSpec::Unsigned { data } => data,
        }
    }

    /// Whether a witness can back a credential of this spec. Does not check validity.
    pub fn matches_spec(&self, witness: &Witness) -> bool {
        match (self, witness) {
            (CredentialSpec::Native { .. }, Witness::Native { .. }) => true,
            (CredentialSpec::Recursive { vk_hash, .. }, Witness::Recursive { vk, .. }) => {
                vk.hash == *vk_hash
            }
            (CredentialSpec::Unsigned { .. }, Witness::Unsigned) => true,
            _ => false,
        }
    }

    /// Check a credential against its witness as part of running a program.
    ///
    /// Accepts exactly the credentials [Self::verify_outside_circuit] accepts.
    pub fn verify(
        &self,
        backend: &dyn Backend,
        witness: &Witness,
        credential: &Credential,
    ) -> Result<(), CredentialError> {
        let _span = tracing::debug_span!("verify_credential", kind = %self.kind()).entered();
        self.verify_outside_circuit(backend, witness, credential)
    }

    /// Check a credential against its witness, outside of any program.
    pub fn verify_outside_circuit(
        &self,
        backend: &dyn Backend,
        witness: &Witness,
        credential: &Credential,
    ) -> Result<(), CredentialError> {
        let found = credential.data.data_type();
        if &found != self.data_type() {
            return Err(CredentialError::DataType {
                expected: self.data_type().clone(),
                found,
            });
        }

        match (self, witness) {
            (
                CredentialSpec::Native { .. },
                Witness::Native {
                    issuer,
                    issuer_signature,
                },
            ) => issuer
                .verify(
                    domain::ISSUER_SIGNATURE,
                    &[credential.hash()],
                    issuer_signature,
                )
                .map_err(|_| CredentialError::InvalidSignature),
            (CredentialSpec::Recursive { vk_hash, .. }, Witness::Recursive { vk, proof }) => {
                if vk.hash != *vk_hash {
                    return Err(CredentialError::VerificationKeyMismatch);
                }
                backend
                    .verify(vk, &proof.public_input, &proof.public_output, &proof.proof)
                    .map_err(|e| CredentialError::InvalidNestedProof(e.to_string()))?;
                match Credential::from_value(&proof.public_output) {
                    Some(output) if output.hash() == credential.hash() => Ok(()),
                    _ => Err(CredentialError::OutputMismatch),
                }
            }
            (CredentialSpec::Unsigned { .. }, Witness::Unsigned) => Ok(()),
            (spec, witness) => Err(CredentialError::WitnessMismatch {
                expected: spec.kind(),
                found: witness.kind(),
            }),
        }
    }

    pub fn issuer(&self, witness: &Witness) -> Result<Scalar, CredentialError> {
        match self.kind() == witness.kind() {
            true => Ok(witness.issuer()),
            false => Err(CredentialError::WitnessMismatch {
                expected: self.kind(),
                found: witness.kind(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Version {
    #[default]
    #[serde(rename = "v0")]
    V0,
}

/// A credential as kept by its owner.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredCredential {
    pub version: Version,
    pub witness: Witness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub credential: Credential,
}

impl StoredCredential {
    pub fn unsigned(credential: Credential) -> Self {
        Self {
            version: Version::V0,
            witness: Witness::Unsigned,
            metadata: None,
            credential,
        }
    }

    pub fn with_metadata(self, metadata: serde_json::Value) -> Self {
        Self {
            metadata: Some(metadata),
            ..self
        }
    }

    pub fn kind(&self) -> CredentialKind {
        self.witness.kind()
    }

    /// The spec this credential satisfies, given its own data type.
    pub fn spec(&self) -> CredentialSpec {
        let data = self.credential.data.data_type();
        match &self.witness {
            Witness::Native { .. } => CredentialSpec::Native { data },
            Witness::Recursive { vk, .. } => CredentialSpec::Recursive {
                vk_hash: vk.hash,
                data,
            },
            Witness::Unsigned => CredentialSpec::Unsigned { data },
        }
    }

    /// Check the witness before accepting the credential into a wallet.
    pub fn validate(&self, backend: &dyn Backend) -> Result<(), Error> {
        self.spec()
            .verify_outside_circuit(backend, &self.witness, &self.credential)
            .map_err(|source| Error::CredentialVerification {
                input: "stored credential".into(),
                source,
            })
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}
