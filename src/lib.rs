//! Private attestations over owner-bound credentials.
//!
//! A verifier describes what it wants to learn as a [Spec]: typed inputs, a boolean assertion and
//! an output claim, written with the [Node] expression language. The owner of a set of
//! [Credential]s answers a [PresentationRequest] with a [Presentation] proving that the assertion
//! holds over credentials vouched for by trusted issuers, revealing only the output claim.

#[cfg(test)]
mod arbitrary;

pub mod attributes;
pub use attributes::{Attributes, TypedValue};

#[cfg(feature = "derive")]
pub use zkattest_derive::Attributes;

pub mod backend;
pub use backend::{Backend, BackendError, TransparentBackend, VerificationKey};

pub mod context;
pub use context::{InputContext, RequestKind, WalletContext, ZkAppIdentity};

pub mod credential;
pub use credential::{Credential, CredentialSpec, StoredCredential, Witness};

pub mod domain;

pub mod error;
pub use error::Error;

pub mod eval;
pub use eval::{eval_node, eval_node_type, EvalError, RootType, RootValue};

pub mod hash;

pub mod node;
pub use node::Node;

pub mod presentation;
pub use presentation::{pick_credentials, PoolEntry, Presentation, PresentationRequest};

pub mod program;

pub mod serialize;
pub use serialize::{deserialize_spec, serialize_spec, SerializedSpec};

pub mod signature;
pub use signature::{PrivateKey, PublicKey, Signature};

pub mod spec;
pub use spec::{Input, Logic, Spec};

pub mod value;
pub use value::{DataType, Value};
