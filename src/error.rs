use crate::{backend::BackendError, credential::CredentialError, eval::EvalError, signature::PublicKey};

/// Errors surfaced by spec construction, the presentation exchange and the wire formats.
///
/// Every variant is terminal for the operation that produced it.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid spec: {0}")]
    SpecConstruction(String),
    #[error("credential {input} failed verification: {source}")]
    CredentialVerification {
        input: String,
        #[source]
        source: CredentialError,
    },
    #[error("credentials have different owners: {first} and {other}")]
    OwnerMismatch { first: PublicKey, other: PublicKey },
    #[error("owner signature is invalid")]
    OwnerSignature,
    #[error("no matching credential for inputs: {}", missing.join(", "))]
    CredentialSelection { missing: Vec<String> },
    #[error("spec integrity check failed: {0}")]
    SpecIntegrity(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("claims do not match the request: {0}")]
    ClaimsMismatch(String),
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
    #[error(transparent)]
    Eval(EvalError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A misplaced `issuer()` is a mistake in the spec, not in the data it is evaluated over.
impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        match e {
            EvalError::IssuerTarget(_) => Self::SpecConstruction(e.to_string()),
            e => Self::Eval(e),
        }
    }
}

impl Error {
    pub(crate) fn malformed(what: &'static str, reason: impl ToString) -> Self {
        Self::Malformed {
            what,
            reason: reason.to_string(),
        }
    }
}
