use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use curve25519_dalek::Scalar;
use zkattest::{
    backend::{PrivateInput, Proof, PublicInput},
    credential::CredentialError,
    pick_credentials, Backend, BackendError, Credential, CredentialSpec, DataType, Error, Input,
    InputContext, Logic, Node, PoolEntry, Presentation, PresentationRequest, PrivateKey,
    RequestKind, Spec, StoredCredential, TransparentBackend, Value, VerificationKey,
    WalletContext, ZkAppIdentity,
};

fn key() -> PrivateKey {
    PrivateKey::random(&mut rand::thread_rng())
}

fn passport_type() -> DataType {
    DataType::record([("age", DataType::UInt32), ("name", DataType::String)])
}

fn passport(owner: &PrivateKey, age: u32) -> Credential {
    Credential::new(
        owner.public_key(),
        Value::record([("age", Value::UInt32(age)), ("name", Value::from("Alice"))]),
    )
}

fn age_check() -> Spec {
    Spec::new(
        [
            ("passport", Input::credential(CredentialSpec::native(passport_type()))),
            ("targetAge", Input::claim(DataType::UInt32)),
        ],
        |h| {
            let passport = h.input("passport")?;
            Ok(Logic::new()
                .assert(passport.get("age").equals(h.input("targetAge")?))
                .assert(passport.get("name").equals("Alice"))
                .output_claim(passport.get("age")))
        },
    )
    .unwrap()
}

fn target_age(age: u32) -> BTreeMap<String, Value> {
    BTreeMap::from([("targetAge".to_string(), Value::UInt32(age))])
}

fn server_nonce(request: &PresentationRequest) -> Scalar {
    match request.input_context() {
        Some(InputContext::Https { server_nonce, .. })
        | Some(InputContext::ZkApp { server_nonce, .. }) => *server_nonce,
        None => Scalar::ZERO,
    }
}

/// An https request for the age check, answered by an owner holding an 18 year old passport.
fn https_presentation() -> (PresentationRequest, Presentation) {
    let issuer = key();
    let owner = key();
    let pool = [PoolEntry::from(passport(&owner, 18).sign(&issuer))];
    let request = PresentationRequest::https(age_check(), target_age(18), "POST /verify").unwrap();
    let presentation = Presentation::create(
        &TransparentBackend,
        &owner,
        &request,
        &pool,
        &WalletContext::https("a.com"),
    )
    .unwrap();
    (request, presentation)
}

fn assert_invalid_proof(result: Result<Value, Error>) {
    let Err(Error::Backend(BackendError::InvalidProof(_))) = &result else {
        panic!("expected an invalid proof, got {result:?}");
    };
}

#[test]
fn native_passport_no_context() {
    let issuer = key();
    let owner = key();
    let pool = [PoolEntry::from(passport(&owner, 18).sign(&issuer))];

    let request = PresentationRequest::no_context(age_check(), target_age(18)).unwrap();
    let presentation = Presentation::create(
        &TransparentBackend,
        &owner,
        &request,
        &pool,
        &WalletContext::NoContext,
    )
    .unwrap();
    assert_eq!(presentation.output_claim, Value::UInt32(18));

    let output = request
        .verify(&TransparentBackend, &presentation, &WalletContext::NoContext)
        .unwrap();
    assert_eq!(output, Value::UInt32(18));
}

#[test]
fn native_passport_over_the_wire() {
    let issuer = key();
    let owner = key();
    let pool = [PoolEntry::from(passport(&owner, 18).sign(&issuer))];
    let wallet = WalletContext::https("a.com");

    let request = PresentationRequest::https(age_check(), target_age(18), "POST /verify").unwrap();
    let received = PresentationRequest::from_json(&request.to_json().unwrap()).unwrap();
    assert_eq!(received.kind(), RequestKind::Https);
    assert_eq!(received.spec(), request.spec());
    assert_eq!(received.input_context(), request.input_context());

    let presentation =
        Presentation::create(&TransparentBackend, &owner, &received, &pool, &wallet).unwrap();
    let presentation = Presentation::from_json(&presentation.to_json().unwrap()).unwrap();
    let output = request
        .verify(&TransparentBackend, &presentation, &wallet)
        .unwrap();
    assert_eq!(output, Value::UInt32(18));
}

#[test]
fn false_statement_cannot_be_proven() {
    let issuer = key();
    let owner = key();
    let pool = [PoolEntry::from(passport(&owner, 20).sign(&issuer))];
    let request = PresentationRequest::no_context(age_check(), target_age(18)).unwrap();

    let Err(Error::Backend(BackendError::ConstraintUnsatisfied(_))) = Presentation::create(
        &TransparentBackend,
        &owner,
        &request,
        &pool,
        &WalletContext::NoContext,
    ) else {
        panic!("presentation created for a false statement");
    };
}

#[test]
fn other_verifier_identity_is_rejected() {
    let (request, presentation) = https_presentation();
    request
        .verify(&TransparentBackend, &presentation, &WalletContext::https("a.com"))
        .unwrap();
    assert_invalid_proof(request.verify(
        &TransparentBackend,
        &presentation,
        &WalletContext::https("b.com"),
    ));
}

#[test]
fn presentation_is_bound_to_its_request() {
    let (request, presentation) = https_presentation();
    let wallet = WalletContext::https("a.com");
    let https = |server_nonce: Scalar, action: &str| {
        PresentationRequest::new(
            RequestKind::Https,
            age_check(),
            target_age(18),
            Some(InputContext::Https {
                server_nonce,
                action: action.into(),
            }),
        )
        .unwrap()
    };

    let same = https(server_nonce(&request), "POST /verify");
    same.verify(&TransparentBackend, &presentation, &wallet)
        .unwrap();

    let other_action = https(server_nonce(&request), "POST /other");
    assert_invalid_proof(other_action.verify(&TransparentBackend, &presentation, &wallet));

    let other_nonce = https(server_nonce(&request) + Scalar::ONE, "POST /verify");
    assert_invalid_proof(other_nonce.verify(&TransparentBackend, &presentation, &wallet));

    let no_context = PresentationRequest::no_context(age_check(), target_age(18)).unwrap();
    assert!(no_context
        .verify(&TransparentBackend, &presentation, &WalletContext::NoContext)
        .is_err());
}

#[test]
fn presentation_fields_are_bound() {
    let (request, presentation) = https_presentation();
    let wallet = WalletContext::https("a.com");

    let mut other_client_nonce = presentation.clone();
    other_client_nonce.client_nonce += Scalar::ONE;
    assert_invalid_proof(request.verify(&TransparentBackend, &other_client_nonce, &wallet));

    let mut other_output = presentation.clone();
    other_output.output_claim = Value::UInt32(21);
    assert_invalid_proof(request.verify(&TransparentBackend, &other_output, &wallet));

    let mut other_claims = presentation.clone();
    other_claims.claims = target_age(21);
    let Err(Error::ClaimsMismatch(_)) =
        request.verify(&TransparentBackend, &other_claims, &wallet)
    else {
        panic!("presentation with different claims was accepted");
    };

    let mut other_data = presentation.clone();
    let mut private_input: PrivateInput = serde_json::from_slice(&other_data.proof.0).unwrap();
    let stored = private_input.credentials.get_mut("passport").unwrap();
    stored.credential.data = Value::record([
        ("age", Value::UInt32(18)),
        ("name", Value::from("Mallory")),
    ]);
    other_data.proof = Proof(serde_json::to_vec(&private_input).unwrap());
    assert_invalid_proof(request.verify(&TransparentBackend, &other_data, &wallet));
}

#[test]
fn zk_app_identity_is_bound() {
    let issuer = key();
    let owner = key();
    let pool = [PoolEntry::from(passport(&owner, 18).sign(&issuer))];
    let address = key().public_key();
    let verifier = |token_id: u64| WalletContext::ZkApp {
        verifier_identity: ZkAppIdentity {
            address,
            token_id: Scalar::from(token_id),
        },
    };

    let request =
        PresentationRequest::zk_app(age_check(), target_age(18), Scalar::from(7u64)).unwrap();
    let presentation =
        Presentation::create(&TransparentBackend, &owner, &request, &pool, &verifier(1)).unwrap();
    request
        .verify(&TransparentBackend, &presentation, &verifier(1))
        .unwrap();
    assert_invalid_proof(request.verify(&TransparentBackend, &presentation, &verifier(2)));
}

#[test]
fn credentials_must_share_an_owner() {
    let issuer = key();
    let alice = key();
    let bob = key();
    let spec = Spec::new(
        [
            ("x", Input::credential(CredentialSpec::native(DataType::UInt64))),
            ("y", Input::credential(CredentialSpec::native(DataType::UInt64))),
        ],
        |h| Ok(Logic::new().output_claim(h.input("x")? + h.input("y")?)),
    )
    .unwrap();
    let request = PresentationRequest::no_context(spec, BTreeMap::new()).unwrap();

    let pool = [
        PoolEntry::from(Credential::new(alice.public_key(), 1u64).sign(&issuer)),
        PoolEntry::from(Credential::new(bob.public_key(), 2u64).sign(&issuer)),
    ];
    let Err(Error::OwnerMismatch { .. }) = Presentation::create(
        &TransparentBackend,
        &alice,
        &request,
        &pool,
        &WalletContext::NoContext,
    ) else {
        panic!("credentials of two owners were combined");
    };

    let pool = [
        PoolEntry::from(Credential::new(alice.public_key(), 1u64).sign(&issuer)),
        PoolEntry::from(Credential::new(alice.public_key(), 2u64).sign(&issuer)),
    ];
    let Err(Error::OwnerMismatch { .. }) = Presentation::create(
        &TransparentBackend,
        &bob,
        &request,
        &pool,
        &WalletContext::NoContext,
    ) else {
        panic!("someone else's credentials were presented");
    };

    let presentation = Presentation::create(
        &TransparentBackend,
        &alice,
        &request,
        &pool,
        &WalletContext::NoContext,
    )
    .unwrap();
    assert_eq!(presentation.output_claim, Value::UInt64(3));
}

#[test]
fn owner_and_issuer_nodes() {
    let issuer = key();
    let owner = key();
    let spec = Spec::new(
        [("passport", Input::credential(CredentialSpec::native(passport_type())))],
        |h| {
            let issuer = Node::issuer(&h.input("passport")?)?;
            Ok(Logic::new().output_claim(Node::record([
                ("issuer", issuer),
                ("owner", Node::owner()),
            ])))
        },
    )
    .unwrap();
    let stored = passport(&owner, 18).sign(&issuer);
    let expected = Value::record([
        ("issuer", Value::Field(stored.witness.issuer())),
        ("owner", Value::PublicKey(owner.public_key())),
    ]);

    let request = PresentationRequest::no_context(spec, BTreeMap::new()).unwrap();
    let presentation = Presentation::create(
        &TransparentBackend,
        &owner,
        &request,
        &[PoolEntry::from(stored)],
        &WalletContext::NoContext,
    )
    .unwrap();
    assert_eq!(presentation.output_claim, expected);
}

#[test]
fn picking_is_positional_for_untagged_credentials() {
    let owner = key();
    let spec = CredentialSpec::unsigned(DataType::UInt64);
    let required = [("x", &spec), ("y", &spec)];
    let unsigned = |x: u64| StoredCredential::unsigned(Credential::new(owner.public_key(), x));

    let pool = [PoolEntry::from(unsigned(1)), PoolEntry::from(unsigned(2))];
    let picked = pick_credentials(&required, &pool).unwrap();
    assert_eq!(picked["x"].credential.data, Value::UInt64(1));
    assert_eq!(picked["y"].credential.data, Value::UInt64(2));

    let Err(Error::CredentialSelection { missing }) = pick_credentials(&required, &pool[..1])
    else {
        panic!("picking succeeded with one credential for two inputs");
    };
    assert_eq!(missing, vec!["y".to_string()]);
}

#[test]
fn untagged_credentials_follow_declaration_order() {
    let owner = key();
    let amount = CredentialSpec::unsigned(DataType::UInt64);
    let spec = Spec::new(
        [
            ("second", Input::credential(amount.clone())),
            ("first", Input::credential(amount)),
        ],
        |h| {
            Ok(Logic::new().output_claim(Node::record([
                ("second", h.input("second")?),
                ("first", h.input("first")?),
            ])))
        },
    )
    .unwrap();
    let names: Vec<_> = spec.credential_inputs().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["second", "first"]);

    let request = PresentationRequest::no_context(spec, BTreeMap::new()).unwrap();
    let request = PresentationRequest::from_json(&request.to_json().unwrap()).unwrap();
    let unsigned = |x: u64| StoredCredential::unsigned(Credential::new(owner.public_key(), x));
    let presentation = Presentation::create(
        &TransparentBackend,
        &owner,
        &request,
        &[PoolEntry::from(unsigned(1)), PoolEntry::from(unsigned(2))],
        &WalletContext::NoContext,
    )
    .unwrap();
    assert_eq!(
        presentation.output_claim,
        Value::record([("second", Value::UInt64(1)), ("first", Value::UInt64(2))])
    );
}

#[test]
fn missing_credentials_are_reported() {
    let owner = key();
    let request = PresentationRequest::no_context(age_check(), target_age(18)).unwrap();
    let unsigned = StoredCredential::unsigned(passport(&owner, 18));
    let Err(Error::CredentialSelection { missing }) = Presentation::create(
        &TransparentBackend,
        &owner,
        &request,
        &[PoolEntry::from(unsigned)],
        &WalletContext::NoContext,
    ) else {
        panic!("an unsigned credential was used as a native one");
    };
    assert_eq!(missing, vec!["passport".to_string()]);
}

#[test]
fn request_checks_claims() {
    let Err(Error::ClaimsMismatch(_)) =
        PresentationRequest::no_context(age_check(), BTreeMap::new())
    else {
        panic!("request without its claims was accepted");
    };
    let Err(Error::Malformed { .. }) =
        PresentationRequest::new(RequestKind::Https, age_check(), target_age(18), None)
    else {
        panic!("https request without an input context was accepted");
    };
}

#[test]
fn request_json_rejects_unknown_fields() {
    let request = PresentationRequest::https(age_check(), target_age(18), "POST /verify").unwrap();
    let mut json: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
    json["extra"] = serde_json::json!(true);
    assert!(PresentationRequest::from_json(&json.to_string()).is_err());

    let (_, presentation) = https_presentation();
    let mut json: serde_json::Value =
        serde_json::from_str(&presentation.to_json().unwrap()).unwrap();
    json["extra"] = serde_json::json!(true);
    assert!(Presentation::from_json(&json.to_string()).is_err());
}

/// Counts how often a spec is compiled.
#[derive(Default)]
struct CountingBackend {
    compiled: AtomicUsize,
}

impl Backend for CountingBackend {
    fn id(&self) -> &'static str {
        "counting"
    }

    fn compile(&self, spec: &Spec) -> Result<VerificationKey, Error> {
        self.compiled.fetch_add(1, Ordering::SeqCst);
        TransparentBackend.compile(spec)
    }

    fn prove(
        &self,
        vk: &VerificationKey,
        public_input: &PublicInput,
        private_input: &PrivateInput,
    ) -> Result<(Value, Proof), Error> {
        TransparentBackend.prove(vk, public_input, private_input)
    }

    fn verify(
        &self,
        vk: &VerificationKey,
        public_input: &PublicInput,
        public_output: &Value,
        proof: &Proof,
    ) -> Result<(), Error> {
        TransparentBackend.verify(vk, public_input, public_output, proof)
    }
}

#[test]
fn compile_is_memoized() {
    let backend = CountingBackend::default();
    let issuer = key();
    let owner = key();
    let pool = [PoolEntry::from(passport(&owner, 18).sign(&issuer))];
    let request = PresentationRequest::no_context(age_check(), target_age(18)).unwrap();

    let first = request.compile(&backend).unwrap();
    let second = request.compile(&backend).unwrap();
    assert!(std::ptr::eq(first, second));

    let presentation =
        Presentation::create(&backend, &owner, &request, &pool, &WalletContext::NoContext)
            .unwrap();
    request
        .verify(&backend, &presentation, &WalletContext::NoContext)
        .unwrap();
    assert_eq!(backend.compiled.load(Ordering::SeqCst), 1);
}

#[test]
fn request_is_bound_to_its_backend() {
    let request = PresentationRequest::no_context(age_check(), target_age(18)).unwrap();
    request.compile(&TransparentBackend).unwrap();

    let backend = CountingBackend::default();
    let Err(Error::Backend(BackendError::BackendMismatch {
        compiled: "transparent",
        requested: "counting",
    })) = request.compile(&backend)
    else {
        panic!("request compiled by one backend was reused by another");
    };
    assert_eq!(backend.compiled.load(Ordering::SeqCst), 0);
}

fn citizenship_type() -> DataType {
    DataType::record([("name", DataType::String)])
}

/// Mints a credential holding only the passport's name.
fn mint_request() -> PresentationRequest {
    let spec = Spec::new(
        [("passport", Input::credential(CredentialSpec::native(passport_type())))],
        |h| {
            Ok(Logic::new().output_claim(Node::record([
                ("owner", Node::owner()),
                ("data", Node::record([("name", h.input("passport")?.get("name"))])),
            ])))
        },
    )
    .unwrap();
    PresentationRequest::no_context(spec, BTreeMap::new()).unwrap()
}

fn name_check(vk: &VerificationKey) -> Spec {
    Spec::new(
        [(
            "citizenship",
            Input::credential(CredentialSpec::recursive(vk, citizenship_type())),
        )],
        |h| {
            let name = h.input("citizenship")?.get("name");
            Ok(Logic::new()
                .assert(name.clone().equals("Alice"))
                .output_claim(name))
        },
    )
    .unwrap()
}

#[test]
fn recursive_credentials() {
    let issuer = key();
    let owner = key();
    let mint = mint_request();
    let minted = Presentation::create(
        &TransparentBackend,
        &owner,
        &mint,
        &[PoolEntry::from(passport(&owner, 18).sign(&issuer))],
        &WalletContext::NoContext,
    )
    .unwrap();
    let recursive = mint
        .recursive_credential(&TransparentBackend, &minted, &WalletContext::NoContext)
        .unwrap();
    recursive.validate(&TransparentBackend).unwrap();
    assert_eq!(recursive.credential.owner, owner.public_key());
    assert_eq!(
        recursive.credential.data,
        Value::record([("name", Value::from("Alice"))])
    );
    let recursive = StoredCredential::from_json(&recursive.to_json().unwrap()).unwrap();

    let vk = mint.compile(&TransparentBackend).unwrap();
    let request = PresentationRequest::https(name_check(vk), BTreeMap::new(), "GET /").unwrap();
    let wallet = WalletContext::https("a.com");
    let presentation = Presentation::create(
        &TransparentBackend,
        &owner,
        &request,
        &[PoolEntry::from(recursive.clone())],
        &wallet,
    )
    .unwrap();
    let output = request
        .verify(&TransparentBackend, &presentation, &wallet)
        .unwrap();
    assert_eq!(output, Value::from("Alice"));

    let mut forged = recursive;
    forged.credential.data = Value::record([("name", Value::from("Mallory"))]);
    let Err(Error::CredentialVerification {
        source: CredentialError::OutputMismatch,
        ..
    }) = forged.validate(&TransparentBackend)
    else {
        panic!("recursive credential with forged data validated");
    };
    let Err(Error::CredentialVerification { .. }) = Presentation::create(
        &TransparentBackend,
        &owner,
        &request,
        &[PoolEntry::from(forged)],
        &wallet,
    ) else {
        panic!("presentation created from a forged recursive credential");
    };
}

#[test]
fn recursive_credentials_are_tied_to_their_program() {
    let issuer = key();
    let owner = key();
    let mint = mint_request();
    let minted = Presentation::create(
        &TransparentBackend,
        &owner,
        &mint,
        &[PoolEntry::from(passport(&owner, 18).sign(&issuer))],
        &WalletContext::NoContext,
    )
    .unwrap();
    let recursive = mint
        .recursive_credential(&TransparentBackend, &minted, &WalletContext::NoContext)
        .unwrap();

    let other_program = TransparentBackend.compile(&age_check()).unwrap();
    let request =
        PresentationRequest::no_context(name_check(&other_program), BTreeMap::new()).unwrap();
    let Err(Error::CredentialSelection { .. }) = Presentation::create(
        &TransparentBackend,
        &owner,
        &request,
        &[PoolEntry::from(recursive)],
        &WalletContext::NoContext,
    ) else {
        panic!("recursive credential accepted for another program");
    };
}
