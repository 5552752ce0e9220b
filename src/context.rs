//! Derivation of the context a presentation is bound to.
//!
//! The context is a single field element committing to the compiled program, the server and client
//! nonces, the verifier identity, the action, and the claims. Free-form identities and actions
//! (https) are hashed with Keccak-256 before entering the context; structured ones (zk-app) are
//! used directly.

use curve25519_dalek::Scalar;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::{
    domain,
    error::Error,
    hash::{hash_fields, hash_values, keccak_fields},
    serialize::field_hex,
    signature::PublicKey,
    value::Value,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    NoContext,
    ZkApp,
    Https,
}

/// The part of the context chosen by the verifier when making a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase",
    deny_unknown_fields
)]
pub enum InputContext {
    ZkApp {
        #[serde(with = "field_hex")]
        server_nonce: Scalar,
        #[serde(with = "field_hex")]
        action: Scalar,
    },
    Https {
        #[serde(with = "field_hex")]
        server_nonce: Scalar,
        action: String,
    },
}

impl InputContext {
    pub fn kind(&self) -> RequestKind {
        match self {
            InputContext::ZkApp { .. } => RequestKind::ZkApp,
            InputContext::Https { .. } => RequestKind::Https,
        }
    }
}

/// On-chain identity of a zk-app verifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZkAppIdentity {
    pub address: PublicKey,
    pub token_id: Scalar,
}

/// The part of the context the wallet observes: who it is talking to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletContext {
    NoContext,
    ZkApp { verifier_identity: ZkAppIdentity },
    Https { verifier_identity: String },
}

impl WalletContext {
    pub fn https(verifier_identity: impl Into<String>) -> Self {
        Self::Https {
            verifier_identity: verifier_identity.into(),
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            WalletContext::NoContext => RequestKind::NoContext,
            WalletContext::ZkApp { .. } => RequestKind::ZkApp,
            WalletContext::Https { .. } => RequestKind::Https,
        }
    }
}

/// Values supplied by the presentation itself.
#[derive(Clone, Copy, Debug)]
pub struct ContextInputs {
    pub vk_hash: Scalar,
    pub client_nonce: Scalar,
    pub claims_hash: Scalar,
}

/// A fresh nonce from the operating system's random source.
pub fn random_nonce() -> Scalar {
    Scalar::random(&mut OsRng)
}

pub fn claims_hash(claims: &Value) -> Scalar {
    hash_values(domain::CLAIMS, [claims])
}

pub fn nonce(server_nonce: &Scalar, client_nonce: &Scalar) -> Scalar {
    hash_fields(domain::NONCE, [server_nonce, client_nonce])
}

pub fn derive_context(
    kind: RequestKind,
    input: Option<&InputContext>,
    wallet: &WalletContext,
    inputs: &ContextInputs,
) -> Result<Scalar, Error> {
    let mismatch = || {
        Error::malformed(
            "context",
            format!(
                "{kind:?} request cannot use {:?} input context with {:?} wallet context",
                input.map(InputContext::kind),
                wallet.kind()
            ),
        )
    };

    let (tag, server_nonce, identity, action): (_, _, Vec<Scalar>, Vec<Scalar>) =
        match (kind, input, wallet) {
            (RequestKind::NoContext, None, WalletContext::NoContext) => {
                (domain::CONTEXT_NO_CONTEXT, Scalar::ZERO, vec![], vec![])
            }
            (
                RequestKind::ZkApp,
                Some(InputContext::ZkApp {
                    server_nonce,
                    action,
                }),
                WalletContext::ZkApp { verifier_identity },
            ) => {
                let [low, high] = verifier_identity.address.to_fields();
                (
                    domain::CONTEXT_ZK_APP,
                    *server_nonce,
                    vec![low, high, verifier_identity.token_id],
                    vec![*action],
                )
            }
            (
                RequestKind::Https,
                Some(InputContext::Https {
                    server_nonce,
                    action,
                }),
                WalletContext::Https { verifier_identity },
            ) => (
                domain::CONTEXT_HTTPS,
                *server_nonce,
                keccak_fields(verifier_identity).to_vec(),
                keccak_fields(action).to_vec(),
            ),
            _ => return Err(mismatch()),
        };

    let nonce = nonce(&server_nonce, &inputs.client_nonce);
    let context = hash_fields(
        tag,
        [&inputs.vk_hash, &nonce]
            .into_iter()
            .chain(&identity)
            .chain(&action)
            .chain([&inputs.claims_hash]),
    );
    tracing::debug!(?kind, "derived presentation context");
    Ok(context)
}
