//! Evaluation of [Node] trees.
//!
//! Evaluation is written once, in [evaluate], against the [EvalDomain] trait. There are two
//! domains: concrete values, used when running a program, and data types, used when building and
//! validating a spec. Because both walk the tree with the same code, the type computed for a node
//! is always the type of the value computed for it.

use std::collections::BTreeMap;

use crate::{
    domain,
    hash::hash_values,
    node::{ComputeFn, Node, Options},
    signature::PublicKey,
    value::{self, DataType, NumericType, Value},
};

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("cannot access property {key} of non-record type {found:?}")]
    NotARecord { key: String, found: DataType },
    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch { expected: DataType, found: DataType },
    #[error("expected a numeric type, found {0:?}")]
    NotNumeric(DataType),
    #[error("expected a boolean, found {0:?}")]
    NotBoolean(DataType),
    #[error("{op:?} overflows {ty:?}")]
    Overflow { op: Arithmetic, ty: NumericType },
    #[error("division by zero")]
    DivisionByZero,
    #[error("issuer is only defined for credential inputs, got {0}")]
    IssuerTarget(String),
    #[error("owner is not available outside of a presentation")]
    OwnerUnavailable,
    #[error("expected an array of options, found {0:?}")]
    NotACollection(DataType),
    #[error("compute node failed: {0}")]
    Compute(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    LessThan,
    LessThanEq,
}

/// The operations a node tree is evaluated with.
///
/// Implemented once over concrete values and once over data types.
pub trait EvalDomain {
    type Item: Clone;

    fn owner(&self) -> Result<Self::Item, EvalError>;
    fn root(&self) -> Self::Item;
    fn issuer(&self, credential_key: &str) -> Result<Self::Item, EvalError>;
    fn constant(&self, value: &Value) -> Self::Item;
    fn property(&self, inner: Self::Item, key: &str) -> Result<Self::Item, EvalError>;
    fn record(&self, fields: BTreeMap<String, Self::Item>) -> Self::Item;
    fn equals(&self, left: Self::Item, right: Self::Item) -> Result<Self::Item, EvalError>;
    fn equals_one_of(
        &self,
        input: Self::Item,
        options: Options<Self::Item>,
    ) -> Result<Self::Item, EvalError>;
    fn compare(
        &self,
        op: Comparison,
        left: Self::Item,
        right: Self::Item,
    ) -> Result<Self::Item, EvalError>;
    fn arithmetic(
        &self,
        op: Arithmetic,
        left: Self::Item,
        right: Self::Item,
    ) -> Result<Self::Item, EvalError>;
    fn and(&self, inputs: Vec<Self::Item>) -> Result<Self::Item, EvalError>;
    fn or(&self, left: Self::Item, right: Self::Item) -> Result<Self::Item, EvalError>;
    fn not(&self, input: Self::Item) -> Result<Self::Item, EvalError>;
    fn hash(&self, inputs: Vec<Self::Item>, prefix: Option<&str>)
        -> Result<Self::Item, EvalError>;
    fn if_then_else(
        &self,
        condition: Self::Item,
        then_item: Self::Item,
        else_item: Self::Item,
    ) -> Result<Self::Item, EvalError>;
    fn compute(
        &self,
        inputs: Vec<Self::Item>,
        output_type: &DataType,
        compute: &ComputeFn,
    ) -> Result<Self::Item, EvalError>;
}

/// Evaluate a node in the given domain. Both branches of a conditional are always evaluated.
pub fn evaluate<D: EvalDomain>(domain: &D, node: &Node) -> Result<D::Item, EvalError> {
    let eval = |node: &Node| evaluate(domain, node);
    let eval_all = |nodes: &[Node]| nodes.iter().map(eval).collect::<Result<Vec<_>, _>>();

    match node {
        Node::Owner => domain.owner(),
        Node::Issuer { credential_key } => domain.issuer(credential_key),
        Node::Constant(value) => Ok(domain.constant(value)),
        Node::Root => Ok(domain.root()),
        Node::Property { inner, key } => domain.property(eval(inner)?, key),
        Node::Record(fields) => {
            let fields = fields
                .iter()
                .map(|(k, n)| Ok((k.clone(), eval(n)?)))
                .collect::<Result<BTreeMap<_, _>, EvalError>>()?;
            Ok(domain.record(fields))
        }
        Node::Equals(l, r) => domain.equals(eval(l)?, eval(r)?),
        Node::EqualsOneOf { input, options } => {
            let input = eval(input)?;
            let options = match options {
                Options::List(list) => Options::List(eval_all(list)?),
                Options::Collection(n) => Options::Collection(Box::new(eval(n)?)),
            };
            domain.equals_one_of(input, options)
        }
        Node::LessThan(l, r) => domain.compare(Comparison::LessThan, eval(l)?, eval(r)?),
        Node::LessThanEq(l, r) => domain.compare(Comparison::LessThanEq, eval(l)?, eval(r)?),
        Node::Add(l, r) => domain.arithmetic(Arithmetic::Add, eval(l)?, eval(r)?),
        Node::Sub(l, r) => domain.arithmetic(Arithmetic::Sub, eval(l)?, eval(r)?),
        Node::Mul(l, r) => domain.arithmetic(Arithmetic::Mul, eval(l)?, eval(r)?),
        Node::Div(l, r) => domain.arithmetic(Arithmetic::Div, eval(l)?, eval(r)?),
        Node::And(inputs) => domain.and(eval_all(inputs)?),
        Node::Or(l, r) => domain.or(eval(l)?, eval(r)?),
        Node::Not(inner) => domain.not(eval(inner)?),
        Node::Hash { inputs, prefix } => domain.hash(eval_all(inputs)?, prefix.as_deref()),
        Node::IfThenElse {
            condition,
            then_node,
            else_node,
        } => domain.if_then_else(eval(condition)?, eval(then_node)?, eval(else_node)?),
        Node::Compute {
            inputs,
            output_type,
            compute,
        } => domain.compute(eval_all(inputs)?, output_type, compute),
    }
}

/// Concrete inputs of a program: the root record, and the owner once it is known.
#[derive(Clone, Debug, Default)]
pub struct RootValue {
    pub inputs: BTreeMap<String, Value>,
    pub owner: Option<PublicKey>,
}

/// Declared input types of a spec.
#[derive(Clone, Debug, Default)]
pub struct RootType {
    pub inputs: BTreeMap<String, DataType>,
}

pub fn eval_node(root: &RootValue, node: &Node) -> Result<Value, EvalError> {
    evaluate(root, node)
}

pub fn eval_node_type(root: &RootType, node: &Node) -> Result<DataType, EvalError> {
    evaluate(root, node)
}

fn expect_type(expected: &DataType, found: &DataType) -> Result<(), EvalError> {
    match expected == found {
        true => Ok(()),
        false => Err(EvalError::TypeMismatch {
            expected: expected.clone(),
            found: found.clone(),
        }),
    }
}

fn expect_bool(value: &Value) -> Result<bool, EvalError> {
    value
        .as_bool()
        .ok_or_else(|| EvalError::NotBoolean(value.data_type()))
}

impl EvalDomain for RootValue {
    type Item = Value;

    fn owner(&self) -> Result<Value, EvalError> {
        self.owner
            .map(Value::PublicKey)
            .ok_or(EvalError::OwnerUnavailable)
    }

    fn root(&self) -> Value {
        Value::Record(self.inputs.clone())
    }

    fn issuer(&self, credential_key: &str) -> Result<Value, EvalError> {
        match self.inputs.get(credential_key) {
            Some(Value::Credential(c)) => Ok(Value::Field(c.issuer)),
            Some(_) => Err(EvalError::IssuerTarget(credential_key.into())),
            None => Err(EvalError::KeyNotFound(credential_key.into())),
        }
    }

    fn constant(&self, value: &Value) -> Value {
        value.clone()
    }

    fn property(&self, inner: Value, key: &str) -> Result<Value, EvalError> {
        match inner {
            Value::Record(mut fields) => fields
                .remove(key)
                .ok_or_else(|| EvalError::KeyNotFound(key.into())),
            Value::Credential(c) => match key {
                "data" => Ok(c.credential.data),
                _ => self.property(c.credential.data, key),
            },
            other => Err(EvalError::NotARecord {
                key: key.into(),
                found: other.data_type(),
            }),
        }
    }

    fn record(&self, fields: BTreeMap<String, Value>) -> Value {
        Value::Record(fields)
    }

    fn equals(&self, left: Value, right: Value) -> Result<Value, EvalError> {
        expect_type(&left.data_type(), &right.data_type())?;
        Ok(Value::Bool(left == right))
    }

    fn equals_one_of(&self, input: Value, options: Options<Value>) -> Result<Value, EvalError> {
        let input_type = input.data_type();
        let options = match options {
            Options::List(list) => list,
            Options::Collection(collection) => match *collection {
                Value::Array { element, items } => {
                    expect_type(&input_type, &element)?;
                    items
                }
                other => return Err(EvalError::NotACollection(other.data_type())),
            },
        };
        for option in options.iter() {
            expect_type(&input_type, &option.data_type())?;
        }
        Ok(Value::Bool(options.contains(&input)))
    }

    fn compare(&self, op: Comparison, left: Value, right: Value) -> Result<Value, EvalError> {
        value::compare(op, &left, &right).map(Value::Bool)
    }

    fn arithmetic(&self, op: Arithmetic, left: Value, right: Value) -> Result<Value, EvalError> {
        value::arithmetic(op, &left, &right)
    }

    fn and(&self, inputs: Vec<Value>) -> Result<Value, EvalError> {
        let mut result = true;
        for input in inputs.iter() {
            result &= expect_bool(input)?;
        }
        Ok(Value::Bool(result))
    }

    fn or(&self, left: Value, right: Value) -> Result<Value, EvalError> {
        Ok(Value::Bool(expect_bool(&left)? | expect_bool(&right)?))
    }

    fn not(&self, input: Value) -> Result<Value, EvalError> {
        Ok(Value::Bool(!expect_bool(&input)?))
    }

    fn hash(&self, inputs: Vec<Value>, prefix: Option<&str>) -> Result<Value, EvalError> {
        Ok(Value::Field(hash_values(
            prefix.unwrap_or(domain::HASH_NODE),
            &inputs,
        )))
    }

    fn if_then_else(
        &self,
        condition: Value,
        then_item: Value,
        else_item: Value,
    ) -> Result<Value, EvalError> {
        expect_type(&then_item.data_type(), &else_item.data_type())?;
        match expect_bool(&condition)? {
            true => Ok(then_item),
            false => Ok(else_item),
        }
    }

    fn compute(
        &self,
        inputs: Vec<Value>,
        output_type: &DataType,
        compute: &ComputeFn,
    ) -> Result<Value, EvalError> {
        let output = compute.call(&inputs)?;
        expect_type(output_type, &output.data_type())?;
        Ok(output)
    }
}

impl EvalDomain for RootType {
    type Item = DataType;

    fn owner(&self) -> Result<DataType, EvalError> {
        Ok(DataType::PublicKey)
    }

    fn root(&self) -> DataType {
        DataType::Record(self.inputs.clone())
    }

    fn issuer(&self, credential_key: &str) -> Result<DataType, EvalError> {
        match self.inputs.get(credential_key) {
            Some(DataType::Credential(_)) => Ok(DataType::Field),
            Some(_) => Err(EvalError::IssuerTarget(credential_key.into())),
            None => Err(EvalError::KeyNotFound(credential_key.into())),
        }
    }

    fn constant(&self, value: &Value) -> DataType {
        value.data_type()
    }

    fn property(&self, inner: DataType, key: &str) -> Result<DataType, EvalError> {
        match inner {
            DataType::Record(mut fields) => fields
                .remove(key)
                .ok_or_else(|| EvalError::KeyNotFound(key.into())),
            DataType::Credential(data) => match key {
                "data" => Ok(*data),
                _ => self.property(*data, key),
            },
            other => Err(EvalError::NotARecord {
                key: key.into(),
                found: other,
            }),
        }
    }

    fn record(&self, fields: BTreeMap<String, DataType>) -> DataType {
        DataType::Record(fields)
    }

    fn equals(&self, left: DataType, right: DataType) -> Result<DataType, EvalError> {
        expect_type(&left, &right)?;
        Ok(DataType::Bool)
    }

    fn equals_one_of(
        &self,
        input: DataType,
        options: Options<DataType>,
    ) -> Result<DataType, EvalError> {
        match options {
            Options::List(list) => {
                for option in list.iter() {
                    expect_type(&input, option)?;
                }
            }
            Options::Collection(collection) => match *collection {
                DataType::Array(element) => expect_type(&input, &element)?,
                other => return Err(EvalError::NotACollection(other)),
            },
        }
        Ok(DataType::Bool)
    }

    fn compare(
        &self,
        _op: Comparison,
        left: DataType,
        right: DataType,
    ) -> Result<DataType, EvalError> {
        numeric_pair(left, right)?;
        Ok(DataType::Bool)
    }

    fn arithmetic(
        &self,
        _op: Arithmetic,
        left: DataType,
        right: DataType,
    ) -> Result<DataType, EvalError> {
        numeric_pair(left, right).map(NumericType::data_type)
    }

    fn and(&self, inputs: Vec<DataType>) -> Result<DataType, EvalError> {
        for input in inputs {
            expect_bool_type(input)?;
        }
        Ok(DataType::Bool)
    }

    fn or(&self, left: DataType, right: DataType) -> Result<DataType, EvalError> {
        expect_bool_type(left)?;
        expect_bool_type(right)
    }

    fn not(&self, input: DataType) -> Result<DataType, EvalError> {
        expect_bool_type(input)
    }

    fn hash(&self, _inputs: Vec<DataType>, _prefix: Option<&str>) -> Result<DataType, EvalError> {
        Ok(DataType::Field)
    }

    fn if_then_else(
        &self,
        condition: DataType,
        then_item: DataType,
        else_item: DataType,
    ) -> Result<DataType, EvalError> {
        expect_type(&then_item, &else_item)?;
        expect_bool_type(condition)?;
        Ok(then_item)
    }

    fn compute(
        &self,
        _inputs: Vec<DataType>,
        output_type: &DataType,
        _compute: &ComputeFn,
    ) -> Result<DataType, EvalError> {
        Ok(output_type.clone())
    }
}

fn expect_bool_type(data_type: DataType) -> Result<DataType, EvalError> {
    match data_type {
        DataType::Bool => Ok(DataType::Bool),
        other => Err(EvalError::NotBoolean(other)),
    }
}

fn numeric_pair(left: DataType, right: DataType) -> Result<NumericType, EvalError> {
    let l = NumericType::of(&left).ok_or(EvalError::NotNumeric(left))?;
    let r = NumericType::of(&right).ok_or(EvalError::NotNumeric(right))?;
    Ok(l.wider(r))
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use curve25519_dalek::Scalar;
    use proptest::prelude::*;

    use super::{eval_node, eval_node_type, EvalError, RootType, RootValue};
    use crate::{
        credential::Credential,
        node::Node,
        signature::PrivateKey,
        value::{CredentialValue, DataType, Value},
    };

    fn passport_root() -> (RootValue, RootType) {
        let owner = PrivateKey::random(&mut rand::thread_rng()).public_key();
        let data = Value::record([
            ("age", Value::UInt32(21)),
            ("nationality", Value::from("CH")),
        ]);
        let credential = Credential {
            owner,
            data: data.clone(),
        };
        let value = RootValue {
            inputs: BTreeMap::from([
                (
                    "passport".to_string(),
                    Value::Credential(Box::new(CredentialValue {
                        credential,
                        issuer: Scalar::from(99u64),
                    })),
                ),
                ("minAge".to_string(), Value::UInt32(18)),
            ]),
            owner: Some(owner),
        };
        let types = RootType {
            inputs: BTreeMap::from([
                (
                    "passport".to_string(),
                    DataType::Credential(Box::new(data.data_type())),
                ),
                ("minAge".to_string(), DataType::UInt32),
            ]),
        };
        (value, types)
    }

    #[test]
    fn credential_properties() {
        let (value, types) = passport_root();
        let passport = Node::root().get("passport").get("data");

        let age = passport.get("age");
        assert_eq!(eval_node(&value, &age).unwrap(), Value::UInt32(21));
        assert_eq!(eval_node_type(&types, &age).unwrap(), DataType::UInt32);

        let issuer = Node::issuer(&passport).unwrap();
        assert_eq!(
            eval_node(&value, &issuer).unwrap(),
            Value::Field(Scalar::from(99u64))
        );
        assert_eq!(eval_node_type(&types, &issuer).unwrap(), DataType::Field);

        let nationality = Node::root().get("passport").get("nationality");
        assert_eq!(eval_node(&value, &nationality).unwrap(), Value::from("CH"));
        assert_eq!(eval_node_type(&types, &nationality).unwrap(), DataType::String);
    }

    #[test]
    fn only_data_is_reserved_on_credentials() {
        let owner = PrivateKey::random(&mut rand::thread_rng()).public_key();
        let data = Value::record([("issuer", Value::from("ACME")), ("owner", Value::UInt8(1))]);
        let value = RootValue {
            inputs: BTreeMap::from([(
                "badge".to_string(),
                Value::Credential(Box::new(CredentialValue {
                    credential: Credential {
                        owner,
                        data: data.clone(),
                    },
                    issuer: Scalar::from(5u64),
                })),
            )]),
            owner: Some(owner),
        };
        let types = RootType {
            inputs: BTreeMap::from([(
                "badge".to_string(),
                DataType::Credential(Box::new(data.data_type())),
            )]),
        };

        let badge = Node::root().get("badge");
        assert_eq!(eval_node(&value, &badge.get("issuer")).unwrap(), Value::from("ACME"));
        assert_eq!(eval_node_type(&types, &badge.get("issuer")).unwrap(), DataType::String);
        assert_eq!(eval_node(&value, &badge.get("owner")).unwrap(), Value::UInt8(1));
        assert_eq!(eval_node(&value, &badge.get("data")).unwrap(), data);
    }

    #[test]
    fn assertion_over_inputs() {
        let (value, types) = passport_root();
        let passport = Node::root().get("passport").get("data");
        let assert = Node::and([
            Node::root()
                .get("minAge")
                .less_than_eq(passport.get("age")),
            passport
                .get("nationality")
                .equals_one_of([Node::from("CH"), Node::from("DE")]),
        ]);
        assert_eq!(eval_node(&value, &assert).unwrap(), Value::Bool(true));
        assert_eq!(eval_node_type(&types, &assert).unwrap(), DataType::Bool);
    }

    #[test]
    fn missing_key() {
        let (value, types) = passport_root();
        let node = Node::root().get("passport").get("data").get("name");
        assert_eq!(
            eval_node(&value, &node),
            Err(EvalError::KeyNotFound("name".into()))
        );
        assert_eq!(
            eval_node_type(&types, &node),
            Err(EvalError::KeyNotFound("name".into()))
        );
    }

    #[test]
    fn empty_equals_one_of_is_false() {
        let node = Node::from(1u8).equals_one_of(Vec::new());
        assert_eq!(
            eval_node(&RootValue::default(), &node).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval_node_type(&RootType::default(), &node).unwrap(),
            DataType::Bool
        );
    }

    #[test]
    fn equals_one_of_collection() {
        let allowed = Value::array(
            DataType::String,
            vec![Value::from("CH"), Value::from("DE")],
        )
        .unwrap();
        let root = RootValue {
            inputs: BTreeMap::from([("allowed".to_string(), allowed)]),
            owner: None,
        };
        let node = Node::from("DE").equals_one_of_collection(Node::root().get("allowed"));
        assert_eq!(eval_node(&root, &node).unwrap(), Value::Bool(true));

        let node = Node::from(3u8).equals_one_of_collection(Node::root().get("allowed"));
        let Err(EvalError::TypeMismatch { .. }) = eval_node(&root, &node) else {
            panic!("membership test across types succeeded");
        };
    }

    #[test]
    fn equals_is_strictly_typed() {
        let node = Node::from(1u8).equals(1u64);
        let Err(EvalError::TypeMismatch { .. }) = eval_node(&RootValue::default(), &node) else {
            panic!("equality across types succeeded");
        };
        let Err(EvalError::TypeMismatch { .. }) = eval_node_type(&RootType::default(), &node)
        else {
            panic!("equality across types type-checked");
        };
    }

    #[test]
    fn if_then_else_branches_must_agree() {
        let node = Node::if_then_else(Node::from(true), Node::from(1u8), Node::from(2u8));
        assert_eq!(
            eval_node(&RootValue::default(), &node).unwrap(),
            Value::UInt8(1)
        );
        let node = Node::if_then_else(Node::from(false), Node::from(1u8), Node::from("x"));
        let Err(EvalError::TypeMismatch { .. }) = eval_node_type(&RootType::default(), &node)
        else {
            panic!("branches of different types type-checked");
        };
    }

    #[test]
    fn hash_respects_prefix() {
        let root = RootValue::default();
        let a = eval_node(&root, &Node::hash([Node::from(1u64)])).unwrap();
        let b = eval_node(&root, &Node::hash_with_prefix("other", [Node::from(1u64)])).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.data_type(), DataType::Field);
    }

    #[test]
    fn owner_requires_presentation() {
        assert_eq!(
            eval_node(&RootValue::default(), &Node::owner()),
            Err(EvalError::OwnerUnavailable)
        );
        assert_eq!(
            eval_node_type(&RootType::default(), &Node::owner()).unwrap(),
            DataType::PublicKey
        );
    }

    #[test]
    fn compute_checks_declared_type() {
        let good = Node::compute([Node::from(2u64)], DataType::UInt64, |inputs| {
            Ok(inputs[0].clone())
        });
        assert_eq!(
            eval_node(&RootValue::default(), &good).unwrap(),
            Value::UInt64(2)
        );
        let bad = Node::compute([Node::from(2u64)], DataType::Bool, |inputs| {
            Ok(inputs[0].clone())
        });
        let Err(EvalError::TypeMismatch { .. }) = eval_node(&RootValue::default(), &bad) else {
            panic!("compute output of the wrong type was accepted");
        };
    }

    fn numeric_leaf() -> impl Strategy<Value = Node> {
        prop_oneof![
            any::<u8>().prop_map(Node::from),
            any::<u32>().prop_map(Node::from),
            any::<u64>().prop_map(Node::from),
            any::<u64>().prop_map(|x| Node::constant(Scalar::from(x))),
        ]
    }

    fn numeric_node() -> impl Strategy<Value = Node> {
        numeric_leaf().prop_recursive(4, 32, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l + r),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l - r),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l * r),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l / r),
            ]
        })
    }

    fn bool_node() -> impl Strategy<Value = Node> {
        let leaf = (numeric_node(), numeric_node()).prop_map(|(l, r)| l.less_than(r));
        leaf.prop_recursive(3, 16, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l & r),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l | r),
                inner.clone().prop_map(|x| !x),
            ]
        })
    }

    /// The passport inputs, plus an array, a large integer and a field element.
    fn mixed_root() -> (RootValue, RootType) {
        let (mut value, mut types) = passport_root();
        let allowed = Value::array(DataType::String, vec![Value::from("CH"), Value::from("DE")])
            .unwrap();
        for (name, input) in [
            ("allowed", allowed),
            ("limit", Value::UInt64(u64::MAX - 1)),
            ("salt", Value::Field(Scalar::from(3u64))),
        ] {
            types.inputs.insert(name.to_string(), input.data_type());
            value.inputs.insert(name.to_string(), input);
        }
        (value, types)
    }

    fn mixed_leaf() -> impl Strategy<Value = Node> {
        let passport = Node::root().get("passport");
        prop_oneof![
            Just(Node::owner()),
            Just(Node::Issuer {
                credential_key: "passport".into()
            }),
            Just(Node::Issuer {
                credential_key: "minAge".into()
            }),
            Just(passport.clone()),
            Just(passport.get("data")),
            Just(passport.get("age")),
            Just(passport.get("nationality")),
            Just(Node::root().get("minAge")),
            Just(Node::root().get("allowed")),
            Just(Node::root().get("limit")),
            Just(Node::root().get("salt")),
            any::<u8>().prop_map(Node::from),
            any::<u32>().prop_map(Node::from),
            any::<u64>().prop_map(Node::from),
            any::<bool>().prop_map(Node::from),
            prop::sample::select(vec!["CH", "DE", "FR"]).prop_map(Node::from),
        ]
    }

    /// Nodes of every kind except compute, over the inputs of [mixed_root].
    fn mixed_node() -> impl Strategy<Value = Node> {
        mixed_leaf().prop_recursive(4, 32, 3, |inner| {
            let list = || prop::collection::vec(inner.clone(), 0..3);
            let key = prop::sample::select(vec!["age", "nationality", "data", "x"]);
            prop_oneof![
                (inner.clone(), key).prop_map(|(node, key)| node.get(key)),
                prop::collection::btree_map("[a-c]", inner.clone(), 0..3).prop_map(Node::Record),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l.equals(r)),
                (inner.clone(), list()).prop_map(|(input, options)| input.equals_one_of(options)),
                (inner.clone(), inner.clone())
                    .prop_map(|(input, options)| input.equals_one_of_collection(options)),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l.less_than(r)),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l.less_than_eq(r)),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l + r),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l - r),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l * r),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l / r),
                list().prop_map(Node::and),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l.or(r)),
                inner.clone().prop_map(|x| !x),
                (list(), proptest::option::of("[a-c]")).prop_map(|(inputs, prefix)| {
                    match prefix {
                        Some(prefix) => Node::hash_with_prefix(prefix, inputs),
                        None => Node::hash(inputs),
                    }
                }),
                (inner.clone(), inner.clone(), inner.clone())
                    .prop_map(|(c, t, e)| Node::if_then_else(c, t, e)),
            ]
        })
    }

    proptest! {
        #[test]
        fn both_domains_agree_on_every_node_kind(node in mixed_node()) {
            let (value, types) = mixed_root();
            match (eval_node_type(&types, &node), eval_node(&value, &node)) {
                (Ok(ty), Ok(value)) => prop_assert_eq!(value.data_type(), ty),
                (Ok(_), Err(e)) => prop_assert!(
                    matches!(e, EvalError::Overflow { .. } | EvalError::DivisionByZero),
                    "well-typed node failed with {}", e
                ),
                (Err(e), Ok(value)) => {
                    prop_assert!(false, "ill-typed node ({}) evaluated to {:?}", e, value)
                }
                (Err(_), Err(_)) => {}
            }
        }

        #[test]
        fn value_type_matches_static_type(node in numeric_node()) {
            let ty = eval_node_type(&RootType::default(), &node).unwrap();
            if let Ok(value) = eval_node(&RootValue::default(), &node) {
                prop_assert_eq!(value.data_type(), ty);
            }
        }

        #[test]
        fn boolean_trees_are_bool(node in bool_node()) {
            prop_assert_eq!(eval_node_type(&RootType::default(), &node).unwrap(), DataType::Bool);
            if let Ok(value) = eval_node(&RootValue::default(), &node) {
                prop_assert_eq!(value.data_type(), DataType::Bool);
            }
        }
    }
}
