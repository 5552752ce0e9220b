use std::collections::BTreeMap;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use zkattest::{
    Attributes, Credential, CredentialSpec, DataType, Input, Logic, Node, PoolEntry,
    Presentation, PresentationRequest, PrivateKey, Spec, TransparentBackend, TypedValue, Value,
    WalletContext,
};

#[derive(Attributes, Clone, Debug)]
struct Passport {
    nationality: String,
    age: u32,
}

fn citizenship_type() -> DataType {
    DataType::record([("nationality", DataType::String)])
}

/// Mints a citizenship credential from a passport signed by the trusted issuer, dropping the age.
fn citizenship() -> Result<Spec> {
    let spec = Spec::new(
        [
            ("passport", Input::credential(CredentialSpec::native(Passport::data_type()))),
            ("trustedIssuer", Input::claim(DataType::Field)),
        ],
        |h| {
            let passport = h.input("passport")?;
            Ok(Logic::new()
                .assert(Node::issuer(&passport)?.equals(h.input("trustedIssuer")?))
                .output_claim(Node::record([
                    ("owner", Node::owner()),
                    ("data", Node::record([("nationality", passport.get("nationality"))])),
                ])))
        },
    )?;
    Ok(spec)
}

/// Accepts citizens of the listed countries, as attested by a citizenship credential.
fn residency(citizenship_vk: &zkattest::VerificationKey) -> Result<Spec> {
    let spec = Spec::new(
        [(
            "citizenship",
            Input::credential(CredentialSpec::recursive(citizenship_vk, citizenship_type())),
        )],
        |h| {
            let nationality = h.input("citizenship")?.get("nationality");
            Ok(Logic::new()
                .assert(nationality.clone().equals_one_of(["DE".into(), "FR".into()]))
                .output_claim(nationality))
        },
    )?;
    Ok(spec)
}

// Walks through turning a passport into a reusable, smaller credential and presenting that.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let backend = TransparentBackend;
    let mut rng = rand::thread_rng();
    let government = PrivateKey::random(&mut rng);
    let owner = PrivateKey::random(&mut rng);

    let passport = Passport {
        nationality: "DE".into(),
        age: 41,
    };
    let stored = Credential::new(owner.public_key(), passport.to_value()).sign(&government);
    let trusted_issuer = stored.witness.issuer();
    println!("Issued a credential with attributes: {passport:?}");

    // The owner proves to themselves that the passport is genuine and keeps the result.
    let claims = BTreeMap::from([("trustedIssuer".to_string(), Value::Field(trusted_issuer))]);
    let mint = PresentationRequest::no_context(citizenship()?, claims)?;
    let minted = Presentation::create(
        &backend,
        &owner,
        &mint,
        &[PoolEntry::from(stored)],
        &WalletContext::NoContext,
    )?;
    let recursive = mint.recursive_credential(&backend, &minted, &WalletContext::NoContext)?;
    recursive.validate(&backend)?;
    println!("Minted a citizenship credential: {:?}", recursive.credential.data);

    // A web verifier asks for citizenship only, and never sees the passport.
    let vk = mint.compile(&backend)?;
    let request = PresentationRequest::https(residency(vk)?, BTreeMap::new(), "POST /register")?;
    let wallet = WalletContext::https("registry.example");
    let presentation = Presentation::create(
        &backend,
        &owner,
        &request,
        &[PoolEntry::keyed("citizenship", recursive)],
        &wallet,
    )?;
    let output = request.verify(&backend, &presentation, &wallet)?;
    println!("registry.example verified the presentation and learned {output:?}");

    Ok(())
}
