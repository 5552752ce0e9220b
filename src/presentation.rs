//! The presentation exchange.
//!
//! A verifier wraps a [Spec] and concrete claims into a [PresentationRequest]. The owner answers
//! with a [Presentation] made from credentials in their wallet, bound to the request's context by
//! a fresh client nonce and the owner's signature. The verifier checks the presentation against
//! the original request and the context it observes, and learns the output claim.

use std::{collections::BTreeMap, sync::Arc};

use curve25519_dalek::Scalar;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::{
    backend::{
        Backend, BackendError, NestedProof, PrivateInput, Proof, PublicInput, VerificationKey,
    },
    context::{
        claims_hash, derive_context, random_nonce, ContextInputs, InputContext, RequestKind,
        WalletContext,
    },
    credential::{Credential, CredentialSpec, StoredCredential, Version, Witness},
    domain,
    error::Error,
    program::owner_message,
    serialize::field_hex,
    signature::PrivateKey,
    spec::Spec,
    value::Value,
};

#[derive(Debug)]
pub struct PresentationRequest {
    kind: RequestKind,
    spec: Arc<Spec>,
    claims: BTreeMap<String, Value>,
    input_context: Option<InputContext>,
    compiled: OnceCell<(&'static str, VerificationKey)>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RequestJson {
    #[serde(rename = "type")]
    kind: RequestKind,
    spec: Spec,
    claims: BTreeMap<String, Value>,
    input_context: Option<InputContext>,
}

impl PresentationRequest {
    /// Build a request, checking the claims against the spec and the context against the kind.
    pub fn new(
        kind: RequestKind,
        spec: impl Into<Arc<Spec>>,
        claims: BTreeMap<String, Value>,
        input_context: Option<InputContext>,
    ) -> Result<Self, Error> {
        let spec = spec.into();
        spec.check_claims(&claims)?;
        let context_kind = input_context.as_ref().map(InputContext::kind);
        match (kind, context_kind) {
            (RequestKind::NoContext, None) => {}
            (kind, Some(context_kind)) if kind == context_kind => {}
            _ => {
                return Err(Error::malformed(
                    "request",
                    format!("{kind:?} request with {context_kind:?} input context"),
                ))
            }
        }
        Ok(Self {
            kind,
            spec,
            claims,
            input_context,
            compiled: OnceCell::new(),
        })
    }

    pub fn no_context(
        spec: impl Into<Arc<Spec>>,
        claims: BTreeMap<String, Value>,
    ) -> Result<Self, Error> {
        Self::new(RequestKind::NoContext, spec, claims, None)
    }

    /// A request for a web verifier, with a fresh server nonce.
    pub fn https(
        spec: impl Into<Arc<Spec>>,
        claims: BTreeMap<String, Value>,
        action: impl Into<String>,
    ) -> Result<Self, Error> {
        let input_context = InputContext::Https {
            server_nonce: random_nonce(),
            action: action.into(),
        };
        Self::new(RequestKind::Https, spec, claims, Some(input_context))
    }

    /// A request for an on-chain verifier, with a fresh server nonce.
    pub fn zk_app(
        spec: impl Into<Arc<Spec>>,
        claims: BTreeMap<String, Value>,
        action: Scalar,
    ) -> Result<Self, Error> {
        let input_context = InputContext::ZkApp {
            server_nonce: random_nonce(),
            action,
        };
        Self::new(RequestKind::ZkApp, spec, claims, Some(input_context))
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    pub fn claims(&self) -> &BTreeMap<String, Value> {
        &self.claims
    }

    pub fn input_context(&self) -> Option<&InputContext> {
        self.input_context.as_ref()
    }

    /// Compile the spec, once. Later calls return the cached verification key.
    ///
    /// A request is bound to the backend it was first compiled with. Compiling it with another
    /// backend fails with [BackendError::BackendMismatch].
    pub fn compile(&self, backend: &dyn Backend) -> Result<&VerificationKey, Error> {
        let (compiled, vk) = self.compiled.get_or_try_init(|| {
            tracing::debug!(backend = backend.id(), "compiling spec");
            backend.compile(&self.spec).map(|vk| (backend.id(), vk))
        })?;
        if *compiled != backend.id() {
            return Err(BackendError::BackendMismatch {
                compiled: *compiled,
                requested: backend.id(),
            }
            .into());
        }
        Ok(vk)
    }

    fn public_input(
        &self,
        vk: &VerificationKey,
        client_nonce: Scalar,
        claims: &BTreeMap<String, Value>,
        wallet: &WalletContext,
    ) -> Result<PublicInput, Error> {
        let claims = Value::Record(claims.clone());
        let context = derive_context(
            self.kind,
            self.input_context.as_ref(),
            wallet,
            &ContextInputs {
                vk_hash: vk.hash,
                client_nonce,
                claims_hash: claims_hash(&claims),
            },
        )?;
        Ok(PublicInput { context, claims })
    }

    /// Verify a presentation made for this request, returning its output claim.
    pub fn verify(
        &self,
        backend: &dyn Backend,
        presentation: &Presentation,
        wallet: &WalletContext,
    ) -> Result<Value, Error> {
        let result = self.verify_inner(backend, presentation, wallet);
        match &result {
            Ok(_) => tracing::info!(kind = ?self.kind, "presentation verified"),
            Err(e) => tracing::warn!(kind = ?self.kind, error = %e, "presentation rejected"),
        }
        result
    }

    fn verify_inner(
        &self,
        backend: &dyn Backend,
        presentation: &Presentation,
        wallet: &WalletContext,
    ) -> Result<Value, Error> {
        if presentation.claims != self.claims {
            return Err(Error::ClaimsMismatch(
                "presentation claims differ from the request".into(),
            ));
        }
        let vk = self.compile(backend)?;
        let public_input =
            self.public_input(vk, presentation.client_nonce, &presentation.claims, wallet)?;
        backend.verify(
            vk,
            &public_input,
            &presentation.output_claim,
            &presentation.proof,
        )?;
        Ok(presentation.output_claim.clone())
    }

    /// Turn a verified presentation whose output claim is `{owner, data}` into a recursive
    /// credential, backed by the presentation's proof.
    pub fn recursive_credential(
        &self,
        backend: &dyn Backend,
        presentation: &Presentation,
        wallet: &WalletContext,
    ) -> Result<StoredCredential, Error> {
        let output = self.verify(backend, presentation, wallet)?;
        let credential = Credential::from_value(&output).ok_or_else(|| {
            Error::malformed("recursive credential", "output claim is not {owner, data}")
        })?;
        let vk = self.compile(backend)?;
        let public_input =
            self.public_input(vk, presentation.client_nonce, &presentation.claims, wallet)?;
        Ok(StoredCredential {
            version: Version::V0,
            witness: Witness::Recursive {
                vk: vk.clone(),
                proof: NestedProof {
                    public_input,
                    public_output: output,
                    proof: presentation.proof.clone(),
                },
            },
            metadata: None,
            credential,
        })
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&RequestJson {
            kind: self.kind,
            spec: Spec::clone(&self.spec),
            claims: self.claims.clone(),
            input_context: self.input_context.clone(),
        })?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let request: RequestJson = serde_json::from_str(json)?;
        Self::new(
            request.kind,
            request.spec,
            request.claims,
            request.input_context,
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Presentation {
    pub version: Version,
    pub claims: BTreeMap<String, Value>,
    pub output_claim: Value,
    #[serde(with = "field_hex")]
    pub client_nonce: Scalar,
    pub proof: Proof,
}

/// A credential offered for a presentation, optionally tagged with the input it is meant for.
#[derive(Clone, Debug)]
pub struct PoolEntry {
    pub key: Option<String>,
    pub credential: StoredCredential,
}

impl PoolEntry {
    pub fn keyed(key: impl Into<String>, credential: StoredCredential) -> Self {
        Self {
            key: Some(key.into()),
            credential,
        }
    }
}

impl From<StoredCredential> for PoolEntry {
    fn from(credential: StoredCredential) -> Self {
        Self {
            key: None,
            credential,
        }
    }
}

fn fits(spec: &CredentialSpec, stored: &StoredCredential) -> bool {
    spec.matches_spec(&stored.witness) && &stored.credential.data.data_type() == spec.data_type()
}

/// Assign stored credentials to the required credential inputs.
///
/// Tagged credentials go to the input named by their tag first. Remaining inputs are filled in
/// order from the untagged credentials, in pool order. Every input left unfilled is reported.
pub fn pick_credentials(
    required: &[(&str, &CredentialSpec)],
    pool: &[PoolEntry],
) -> Result<BTreeMap<String, StoredCredential>, Error> {
    let mut available: Vec<Option<&PoolEntry>> = pool.iter().map(Some).collect();
    let mut picked = BTreeMap::new();

    for (name, spec) in required {
        let slot = available.iter_mut().find(|slot| {
            matches!(slot, Some(entry)
                if entry.key.as_deref() == Some(*name) && fits(spec, &entry.credential))
        });
        if let Some(entry) = slot.and_then(Option::take) {
            picked.insert(name.to_string(), entry.credential.clone());
        }
    }

    for (name, spec) in required {
        if picked.contains_key(*name) {
            continue;
        }
        let slot = available.iter_mut().find(|slot| {
            matches!(slot, Some(entry) if entry.key.is_none() && fits(spec, &entry.credential))
        });
        if let Some(entry) = slot.and_then(Option::take) {
            picked.insert(name.to_string(), entry.credential.clone());
        }
    }

    let missing: Vec<String> = required
        .iter()
        .filter(|(name, _)| !picked.contains_key(*name))
        .map(|(name, _)| name.to_string())
        .collect();
    tracing::debug!(picked = picked.len(), missing = missing.len(), "picked credentials");
    match missing.is_empty() {
        true => Ok(picked),
        false => Err(Error::CredentialSelection { missing }),
    }
}

impl Presentation {
    /// Answer a request with credentials from the given pool.
    pub fn create(
        backend: &dyn Backend,
        owner_key: &PrivateKey,
        request: &PresentationRequest,
        pool: &[PoolEntry],
        wallet: &WalletContext,
    ) -> Result<Self, Error> {
        let client_nonce = random_nonce();
        let vk = request.compile(backend)?;
        let public_input = request.public_input(vk, client_nonce, &request.claims, wallet)?;

        let required: Vec<_> = request.spec.credential_inputs().collect();
        let credentials = pick_credentials(&required, pool)?;

        let mut signed = Vec::with_capacity(required.len());
        for (name, spec) in required.iter() {
            let stored = credentials
                .get(*name)
                .ok_or_else(|| Error::CredentialSelection {
                    missing: vec![name.to_string()],
                })?;
            let issuer = spec
                .issuer(&stored.witness)
                .map_err(|source| Error::CredentialVerification {
                    input: name.to_string(),
                    source,
                })?;
            signed.push((&stored.credential, issuer));
        }
        let owner_signature = owner_key.sign(
            domain::OWNER_SIGNATURE,
            &owner_message(public_input.context, signed),
        );

        let private_input = PrivateInput {
            owner: owner_key.public_key(),
            owner_signature,
            credentials,
        };
        let (output_claim, proof) = backend.prove(vk, &public_input, &private_input)?;
        tracing::info!(kind = ?request.kind, "presentation created");

        Ok(Self {
            version: Version::V0,
            claims: request.claims.clone(),
            output_claim,
            client_nonce,
            proof,
        })
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}
