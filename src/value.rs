//! Typed values and the type descriptors that describe them.
//!
//! A [Value] is what the expression engine computes over: credential data, claims, constants and
//! the results of nodes. Every value knows its own [DataType], which is what the type-level
//! evaluator predicts without concrete data.

use std::collections::BTreeMap;

use curve25519_dalek::Scalar;

use crate::{
    credential::Credential,
    eval::{Arithmetic, Comparison, EvalError},
    signature::PublicKey,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataType {
    Undefined,
    Bool,
    Field,
    UInt8,
    UInt32,
    UInt64,
    String,
    Bytes,
    PublicKey,
    Array(Box<DataType>),
    Record(BTreeMap<String, DataType>),
    /// A credential input as seen from the root of a spec. Carries the type of the credential data.
    Credential(Box<DataType>),
}

impl DataType {
    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, DataType)>) -> Self {
        Self::Record(fields.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    pub fn array(inner: DataType) -> Self {
        Self::Array(Box::new(inner))
    }

    pub fn is_numeric(&self) -> bool {
        NumericType::of(self).is_some()
    }
}

/// Numeric width classes, ordered from narrowest to widest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum NumericType {
    UInt8,
    UInt32,
    UInt64,
    Field,
}

impl NumericType {
    pub fn of(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::UInt8 => Some(Self::UInt8),
            DataType::UInt32 => Some(Self::UInt32),
            DataType::UInt64 => Some(Self::UInt64),
            DataType::Field => Some(Self::Field),
            _ => None,
        }
    }

    /// The type both operands are converted to before a binary operation.
    pub fn wider(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn data_type(self) -> DataType {
        match self {
            Self::UInt8 => DataType::UInt8,
            Self::UInt32 => DataType::UInt32,
            Self::UInt64 => DataType::UInt64,
            Self::Field => DataType::Field,
        }
    }

    fn max_uint(self) -> Option<u64> {
        match self {
            Self::UInt8 => Some(u8::MAX.into()),
            Self::UInt32 => Some(u32::MAX.into()),
            Self::UInt64 => Some(u64::MAX),
            Self::Field => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Undefined,
    Bool(bool),
    Field(Scalar),
    UInt8(u8),
    UInt32(u32),
    UInt64(u64),
    String(String),
    Bytes(Vec<u8>),
    PublicKey(PublicKey),
    Array {
        element: DataType,
        items: Vec<Value>,
    },
    Record(BTreeMap<String, Value>),
    /// A credential input, together with the issuer identity derived from its witness.
    Credential(Box<CredentialValue>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialValue {
    pub credential: Credential,
    pub issuer: Scalar,
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Undefined => DataType::Undefined,
            Value::Bool(_) => DataType::Bool,
            Value::Field(_) => DataType::Field,
            Value::UInt8(_) => DataType::UInt8,
            Value::UInt32(_) => DataType::UInt32,
            Value::UInt64(_) => DataType::UInt64,
            Value::String(_) => DataType::String,
            Value::Bytes(_) => DataType::Bytes,
            Value::PublicKey(_) => DataType::PublicKey,
            Value::Array { element, .. } => DataType::Array(Box::new(element.clone())),
            Value::Record(fields) => DataType::Record(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.data_type()))
                    .collect(),
            ),
            Value::Credential(c) => DataType::Credential(Box::new(c.credential.data.data_type())),
        }
    }

    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build an array, checking every item has the declared element type.
    pub fn array(element: DataType, items: Vec<Value>) -> Result<Self, EvalError> {
        if let Some(bad) = items.iter().find(|v| v.data_type() != element) {
            return Err(EvalError::TypeMismatch {
                expected: element,
                found: bad.data_type(),
            });
        }
        Ok(Self::Array { element, items })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.get(key),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::UInt8(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::UInt32(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt64(value)
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        Value::Field(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<PublicKey> for Value {
    fn from(value: PublicKey) -> Self {
        Value::PublicKey(value)
    }
}

/// A numeric operand, read at its own width.
#[derive(Clone, Copy, Debug)]
enum Numeric {
    UInt(u64),
    Field(Scalar),
}

fn numeric_operand(value: &Value) -> Result<(NumericType, Numeric), EvalError> {
    match value {
        Value::UInt8(x) => Ok((NumericType::UInt8, Numeric::UInt((*x).into()))),
        Value::UInt32(x) => Ok((NumericType::UInt32, Numeric::UInt((*x).into()))),
        Value::UInt64(x) => Ok((NumericType::UInt64, Numeric::UInt(*x))),
        Value::Field(x) => Ok((NumericType::Field, Numeric::Field(*x))),
        other => Err(EvalError::NotNumeric(other.data_type())),
    }
}

impl Numeric {
    fn into_field(self) -> Scalar {
        match self {
            Numeric::UInt(x) => Scalar::from(x),
            Numeric::Field(x) => x,
        }
    }
}

/// Read both operands and the wider of their two types. Integer operands are converted to field
/// elements by the caller when the wider type is `Field`.
fn promote_pair(left: &Value, right: &Value) -> Result<(NumericType, Numeric, Numeric), EvalError> {
    let (lt, l) = numeric_operand(left)?;
    let (rt, r) = numeric_operand(right)?;
    Ok((lt.wider(rt), l, r))
}

fn narrow(x: u64, ty: NumericType, op: Arithmetic) -> Result<Value, EvalError> {
    let overflow = || EvalError::Overflow { op, ty };
    match ty {
        NumericType::UInt8 => u8::try_from(x).map(Value::UInt8).map_err(|_| overflow()),
        NumericType::UInt32 => u32::try_from(x).map(Value::UInt32).map_err(|_| overflow()),
        NumericType::UInt64 => Ok(Value::UInt64(x)),
        NumericType::Field => Ok(Value::Field(Scalar::from(x))),
    }
}

/// Big-endian byte representation of the canonical integer behind a field element.
fn field_be_bytes(x: &Scalar) -> [u8; 32] {
    let mut bytes = x.to_bytes();
    bytes.reverse();
    bytes
}

/// Apply a binary arithmetic operation, converting both operands up to the wider type first.
///
/// Integer arithmetic is checked against the width of the result type. Field arithmetic is
/// modular, with division defined as multiplication by the inverse.
pub(crate) fn arithmetic(op: Arithmetic, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (ty, l, r) = promote_pair(left, right)?;
    match (l, r) {
        (Numeric::UInt(l), Numeric::UInt(r)) => {
            let result = match op {
                Arithmetic::Add => l.checked_add(r),
                Arithmetic::Sub => l.checked_sub(r),
                Arithmetic::Mul => l.checked_mul(r),
                Arithmetic::Div => {
                    if r == 0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    l.checked_div(r)
                }
            };
            let result = result
                .filter(|x| ty.max_uint().is_some_and(|max| *x <= max))
                .ok_or(EvalError::Overflow { op, ty })?;
            narrow(result, ty, op)
        }
        (l, r) => {
            let (l, r) = (l.into_field(), r.into_field());
            let result = match op {
                Arithmetic::Add => l + r,
                Arithmetic::Sub => l - r,
                Arithmetic::Mul => l * r,
                Arithmetic::Div => {
                    let inverse: Option<Scalar> = ff::Field::invert(&r).into();
                    l * inverse.ok_or(EvalError::DivisionByZero)?
                }
            };
            Ok(Value::Field(result))
        }
    }
}

/// Compare two numeric values after promotion to the wider type.
pub(crate) fn compare(op: Comparison, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let (_, l, r) = promote_pair(left, right)?;
    let ordering = match (l, r) {
        (Numeric::UInt(l), Numeric::UInt(r)) => l.cmp(&r),
        (l, r) => field_be_bytes(&l.into_field()).cmp(&field_be_bytes(&r.into_field())),
    };
    Ok(match op {
        Comparison::LessThan => ordering.is_lt(),
        Comparison::LessThanEq => ordering.is_le(),
    })
}
