//! The statement a presentation proves, as executed by a backend.
//!
//! Given the public context and claims and the owner's private credentials and signature, a
//! [Program] checks every credential against its witness, checks that all credentials share one
//! owner, checks the owner's signature over the context and every (credential hash, issuer) pair,
//! asserts the spec's condition and evaluates its output claim.

use std::collections::BTreeMap;

use curve25519_dalek::Scalar;

use crate::{
    backend::{Backend, BackendError, PrivateInput, PublicInput},
    credential::Credential,
    domain,
    error::Error,
    eval::{eval_node, RootValue},
    spec::Spec,
    value::{CredentialValue, Value},
};

#[derive(Clone, Debug)]
pub struct Program {
    spec: Spec,
}

impl Program {
    pub fn new(spec: Spec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    pub fn run(
        &self,
        backend: &dyn Backend,
        public_input: &PublicInput,
        private_input: &PrivateInput,
    ) -> Result<Value, Error> {
        let mut inputs = BTreeMap::new();
        let mut signed = Vec::new();
        let mut owner = None;

        for (name, spec) in self.spec.credential_inputs() {
            let stored = private_input.credentials.get(name).ok_or_else(|| {
                Error::CredentialSelection {
                    missing: vec![name.to_string()],
                }
            })?;
            let credential = &stored.credential;
            let verification_error = |source| Error::CredentialVerification {
                input: name.to_string(),
                source,
            };
            spec.verify(backend, &stored.witness, credential)
                .map_err(verification_error)?;
            let issuer = spec
                .issuer(&stored.witness)
                .map_err(verification_error)?;

            match owner {
                None => owner = Some(credential.owner),
                Some(first) if first != credential.owner => {
                    return Err(Error::OwnerMismatch {
                        first,
                        other: credential.owner,
                    })
                }
                Some(_) => {}
            }

            signed.push((credential, issuer));
            inputs.insert(
                name.to_string(),
                Value::Credential(Box::new(CredentialValue {
                    credential: credential.clone(),
                    issuer,
                })),
            );
        }

        let owner = match owner {
            Some(owner) if owner != private_input.owner => {
                return Err(Error::OwnerMismatch {
                    first: owner,
                    other: private_input.owner,
                })
            }
            _ => private_input.owner,
        };
        owner
            .verify(
                domain::OWNER_SIGNATURE,
                &owner_message(public_input.context, signed),
                &private_input.owner_signature,
            )
            .map_err(|_| Error::OwnerSignature)?;

        let Value::Record(claims) = &public_input.claims else {
            return Err(Error::ClaimsMismatch("claims must be a record".into()));
        };
        self.spec.check_claims(claims)?;
        inputs.extend(claims.clone());
        inputs.extend(
            self.spec
                .constants()
                .map(|(name, value)| (name.to_string(), value.clone())),
        );

        let root = RootValue {
            inputs,
            owner: Some(owner),
        };
        match eval_node(&root, self.spec.assert())? {
            Value::Bool(true) => {}
            _ => return Err(BackendError::ConstraintUnsatisfied("assert".into()).into()),
        }
        Ok(eval_node(&root, self.spec.output_claim())?)
    }
}

/// The message the owner signs: the context, followed by a (credential hash, issuer) pair per
/// credential input in declaration order.
pub(crate) fn owner_message<'a>(
    context: Scalar,
    credentials: impl IntoIterator<Item = (&'a Credential, Scalar)>,
) -> Vec<Scalar> {
    let mut message = vec![context];
    for (credential, issuer) in credentials {
        message.extend([credential.hash(), issuer]);
    }
    message
}
