//! Proptest strategies shared by the unit tests.

use curve25519_dalek::Scalar;
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    credential::CredentialSpec,
    node::{Node, Options},
    signature::{PrivateKey, PublicKey},
    spec::Input,
    value::{DataType, Value},
};

pub fn key() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

pub fn field() -> impl Strategy<Value = Scalar> {
    any::<[u8; 32]>().prop_map(Scalar::from_bytes_mod_order)
}

/// A private key derived from a seed.
pub fn private_key(seed: [u8; 32]) -> PrivateKey {
    PrivateKey::random(&mut StdRng::from_seed(seed))
}

pub fn public_key() -> impl Strategy<Value = PublicKey> {
    any::<[u8; 32]>().prop_map(|seed| private_key(seed).public_key())
}

pub fn data_type() -> impl Strategy<Value = DataType> {
    let leaf = prop_oneof![
        Just(DataType::Undefined),
        Just(DataType::Bool),
        Just(DataType::Field),
        Just(DataType::UInt8),
        Just(DataType::UInt32),
        Just(DataType::UInt64),
        Just(DataType::String),
        Just(DataType::Bytes),
        Just(DataType::PublicKey),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(DataType::array),
            prop::collection::btree_map(key(), inner, 0..4).prop_map(DataType::Record),
        ]
    })
}

pub fn value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Undefined),
        any::<bool>().prop_map(Value::Bool),
        field().prop_map(Value::Field),
        any::<u8>().prop_map(Value::UInt8),
        any::<u32>().prop_map(Value::UInt32),
        any::<u64>().prop_map(Value::UInt64),
        ".{0,8}".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
        public_key().prop_map(Value::PublicKey),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::btree_map(key(), inner, 0..4).prop_map(Value::Record),
            prop::collection::vec(any::<u32>(), 0..4).prop_map(|items| {
                let items = items.into_iter().map(Value::UInt32).collect();
                Value::Array {
                    element: DataType::UInt32,
                    items,
                }
            }),
            data_type().prop_map(|element| Value::Array {
                element,
                items: Vec::new(),
            }),
        ]
    })
}

/// Nodes of every serializable kind, with no regard for their types.
pub fn node() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        Just(Node::Owner),
        Just(Node::Root),
        key().prop_map(|credential_key| Node::Issuer { credential_key }),
        value().prop_map(Node::Constant),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        let boxed = || inner.clone().prop_map(Box::new);
        let list = || prop::collection::vec(inner.clone(), 0..3);
        prop_oneof![
            (inner.clone(), key()).prop_map(|(node, key)| node.get(key)),
            prop::collection::btree_map(key(), inner.clone(), 0..3).prop_map(Node::Record),
            (boxed(), boxed()).prop_map(|(l, r)| Node::Equals(l, r)),
            (boxed(), list()).prop_map(|(input, options)| Node::EqualsOneOf {
                input,
                options: Options::List(options),
            }),
            (boxed(), boxed()).prop_map(|(input, collection)| Node::EqualsOneOf {
                input,
                options: Options::Collection(collection),
            }),
            (boxed(), boxed()).prop_map(|(l, r)| Node::LessThan(l, r)),
            (boxed(), boxed()).prop_map(|(l, r)| Node::LessThanEq(l, r)),
            (boxed(), boxed()).prop_map(|(l, r)| Node::Add(l, r)),
            (boxed(), boxed()).prop_map(|(l, r)| Node::Sub(l, r)),
            (boxed(), boxed()).prop_map(|(l, r)| Node::Mul(l, r)),
            (boxed(), boxed()).prop_map(|(l, r)| Node::Div(l, r)),
            list().prop_map(Node::And),
            (boxed(), boxed()).prop_map(|(l, r)| Node::Or(l, r)),
            boxed().prop_map(Node::Not),
            (list(), proptest::option::of(key()))
                .prop_map(|(inputs, prefix)| Node::Hash { inputs, prefix }),
            (boxed(), boxed(), boxed()).prop_map(|(condition, then_node, else_node)| {
                Node::IfThenElse {
                    condition,
                    then_node,
                    else_node,
                }
            }),
        ]
    })
}

pub fn input() -> impl Strategy<Value = Input> {
    prop_oneof![
        data_type().prop_map(|data| Input::credential(CredentialSpec::native(data))),
        data_type().prop_map(|data| Input::credential(CredentialSpec::unsigned(data))),
        (field(), data_type()).prop_map(|(vk_hash, data)| {
            Input::credential(CredentialSpec::Recursive { vk_hash, data })
        }),
        data_type().prop_map(Input::claim),
        value().prop_map(Input::constant),
    ]
}

/// Named inputs with distinct names other than `owner`, in generation order.
pub fn inputs() -> impl Strategy<Value = Vec<(String, Input)>> {
    prop::collection::vec((key(), input()), 1..5).prop_map(|mut inputs| {
        let mut seen = std::collections::BTreeSet::new();
        inputs.retain(|(name, _)| name != "owner" && seen.insert(name.clone()));
        inputs
    })
}
