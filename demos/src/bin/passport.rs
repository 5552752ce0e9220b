use std::collections::BTreeMap;

use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;
use zkattest::{
    Attributes, BackendError, Credential, CredentialSpec, DataType, Error, Input, Logic,
    PoolEntry, Presentation, PresentationRequest, PrivateKey, Spec, StoredCredential,
    TransparentBackend, TypedValue, Value, WalletContext,
};

#[derive(Attributes, Clone, Debug)]
struct Passport {
    age: u32,
    name: String,
}

/// The verifier's policy: a passport of the requested age, issued to Alice. Discloses the age.
fn age_check() -> Result<Spec> {
    let spec = Spec::new(
        [
            ("passport", Input::credential(CredentialSpec::native(Passport::data_type()))),
            ("targetAge", Input::claim(DataType::UInt32)),
        ],
        |h| {
            let passport = h.input("passport")?;
            Ok(Logic::new()
                .assert(passport.get("age").equals(h.input("targetAge")?))
                .assert(passport.get("name").equals("Alice"))
                .output_claim(passport.get("age")))
        },
    )?;
    Ok(spec)
}

fn issue(issuer: &PrivateKey, owner: &PrivateKey, passport: &Passport) -> Result<StoredCredential> {
    let stored = Credential::new(owner.public_key(), passport.to_value()).sign(issuer);
    // The wallet checks the issuer signature before storing anything.
    stored.validate(&TransparentBackend)?;
    Ok(stored)
}

// Walks through an issuer, an owner and a web verifier exchanging a passport attestation.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let backend = TransparentBackend;
    let mut rng = rand::thread_rng();
    let issuer = PrivateKey::random(&mut rng);
    let owner = PrivateKey::random(&mut rng);

    let passport = Passport {
        age: 18,
        name: "Alice".into(),
    };
    let wallet = vec![PoolEntry::from(issue(&issuer, &owner, &passport)?)];
    println!("Issued a credential with attributes: {passport:?}");

    // The verifier at a.com asks for an 18 year old.
    let claims = BTreeMap::from([("targetAge".to_string(), Value::UInt32(18))]);
    let request = PresentationRequest::https(age_check()?, claims.clone(), "POST /verify")?;
    let received = PresentationRequest::from_json(&request.to_json()?)?;

    let presentation = Presentation::create(
        &backend,
        &owner,
        &received,
        &wallet,
        &WalletContext::https("a.com"),
    )?;
    let presentation = Presentation::from_json(&presentation.to_json()?)?;
    println!("Created a presentation for a.com");

    let output = request.verify(&backend, &presentation, &WalletContext::https("a.com"))?;
    println!("a.com verified the presentation and learned {output:?}");

    // The same presentation, replayed to another verifier.
    match request.verify(&backend, &presentation, &WalletContext::https("b.com")) {
        Ok(_) => bail!("b.com accepted a presentation made for a.com"),
        Err(e) => println!("b.com rejected the replayed presentation: {e}"),
    }

    // An owner whose passport says 20 cannot claim to be 18.
    let older = Passport {
        age: 20,
        name: "Alice".into(),
    };
    let wallet = vec![PoolEntry::from(issue(&issuer, &owner, &older)?)];
    let request = PresentationRequest::https(age_check()?, claims, "POST /verify")?;
    match Presentation::create(
        &backend,
        &owner,
        &request,
        &wallet,
        &WalletContext::https("a.com"),
    ) {
        Err(Error::Backend(BackendError::ConstraintUnsatisfied(_))) => {
            println!("The owner could not prove a false statement")
        }
        Err(e) => bail!("unexpected error: {e}"),
        Ok(_) => bail!("a presentation was created for a false statement"),
    }

    Ok(())
}
