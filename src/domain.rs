//! Domain separation tags.
//!
//! Every hash and signature in the crate is taken under one of these tags, so that a digest
//! computed for one purpose can never be replayed as a digest for another.

/// Canonical hash of a typed value.
pub const VALUE: &str = "zkattest::value";

/// Hash of the owner public key inside a credential hash.
pub const OWNER: &str = "zkattest::owner";

/// Hash binding an owner to credential data.
pub const CREDENTIAL: &str = "zkattest::credential";

/// Issuer identity of a signature-backed credential.
pub const ISSUER_NATIVE: &str = "zkattest::issuer::native";

/// Issuer identity of a proof-backed credential.
pub const ISSUER_RECURSIVE: &str = "zkattest::issuer::recursive";

/// Hash of the claims disclosed with a presentation.
pub const CLAIMS: &str = "zkattest::claims";

/// Hash of a nested proof's public input.
pub const PUBLIC_INPUT: &str = "zkattest::public_input";

/// Combination of the server and client nonces.
pub const NONCE: &str = "zkattest::nonce";

/// Default prefix for `hash` nodes that do not carry their own.
pub const HASH_NODE: &str = "zkattest::node::hash";

/// Verification key of the transparent backend.
pub const VERIFICATION_KEY: &str = "zkattest::backend::transparent::vk";

pub const CONTEXT_NO_CONTEXT: &str = "zkattest::context::no-context";
pub const CONTEXT_ZK_APP: &str = "zkattest::context::zk-app";
pub const CONTEXT_HTTPS: &str = "zkattest::context::https";

/// Transcript label for issuer signatures over a credential hash.
pub const ISSUER_SIGNATURE: &[u8] = b"zkattest::signature::issuer";

/// Transcript label for the owner signature aggregating all credentials in a presentation.
pub const OWNER_SIGNATURE: &[u8] = b"zkattest::signature::owner";
