//! The expression language used to state what a presentation proves.
//!
//! A [Node] is an untyped tree; its type is computed by [crate::eval::eval_node_type], and its
//! value by [crate::eval::eval_node]. Handles for the inputs of a spec are produced by
//! [crate::spec::Spec::new], and combined with the constructors here and the operator impls in
//! [ops].

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    eval::EvalError,
    value::{DataType, Value},
};

mod ops;

pub type ComputeResult = Result<Value, EvalError>;

/// Free-form derived value with an explicitly declared output type.
///
/// A compute node can be evaluated, but it has no serialized form.
#[derive(Clone)]
pub struct ComputeFn(Arc<dyn Fn(&[Value]) -> ComputeResult + Send + Sync>);

impl ComputeFn {
    pub fn call(&self, inputs: &[Value]) -> ComputeResult {
        (self.0)(inputs)
    }
}

impl fmt::Debug for ComputeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComputeFn(..)")
    }
}

impl PartialEq for ComputeFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Options of an `equalsOneOf` node: a literal list, or a single node evaluating to an array.
#[derive(Clone, Debug, PartialEq)]
pub enum Options<T> {
    List(Vec<T>),
    Collection(Box<T>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// The public key that owns every credential in the presentation.
    Owner,
    /// The issuer identity of a named credential input.
    Issuer {
        credential_key: String,
    },
    Constant(Value),
    /// The record of all inputs of a spec.
    Root,
    Property {
        inner: Box<Node>,
        key: String,
    },
    Record(BTreeMap<String, Node>),
    Equals(Box<Node>, Box<Node>),
    EqualsOneOf {
        input: Box<Node>,
        options: Options<Node>,
    },
    LessThan(Box<Node>, Box<Node>),
    LessThanEq(Box<Node>, Box<Node>),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Div(Box<Node>, Box<Node>),
    And(Vec<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Hash {
        inputs: Vec<Node>,
        prefix: Option<String>,
    },
    IfThenElse {
        condition: Box<Node>,
        then_node: Box<Node>,
        else_node: Box<Node>,
    },
    Compute {
        inputs: Vec<Node>,
        output_type: DataType,
        compute: ComputeFn,
    },
}

impl Node {
    pub fn owner() -> Self {
        Node::Owner
    }

    /// Issuer of a credential input.
    ///
    /// The argument must be the handle of a credential input, i.e. exactly
    /// `property(property(root, key), "data")`. Anything else is rejected.
    pub fn issuer(credential: &Node) -> Result<Self, EvalError> {
        match credential {
            Node::Property { inner, key } if key == "data" => match inner.as_ref() {
                Node::Property { inner, key } if matches!(inner.as_ref(), Node::Root) => {
                    Ok(Node::Issuer {
                        credential_key: key.clone(),
                    })
                }
                _ => Err(EvalError::IssuerTarget(format!("{credential:?}"))),
            },
            _ => Err(EvalError::IssuerTarget(format!("{credential:?}"))),
        }
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Node::Constant(value.into())
    }

    pub fn undefined() -> Self {
        Node::Constant(Value::Undefined)
    }

    pub fn root() -> Self {
        Node::Root
    }

    /// Access a property of a record, or of a credential's data.
    ///
    /// On a credential, `data` yields the whole data record and any other key is read from it.
    /// The owner and issuer are reached with [Node::owner] and [Node::issuer].
    pub fn get(&self, key: impl Into<String>) -> Self {
        Node::Property {
            inner: Box::new(self.clone()),
            key: key.into(),
        }
    }

    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Record(fields.into_iter().map(|(k, n)| (k.into(), n)).collect())
    }

    pub fn equals(self, other: impl Into<Node>) -> Self {
        Node::Equals(Box::new(self), Box::new(other.into()))
    }

    pub fn equals_one_of(self, options: impl IntoIterator<Item = Node>) -> Self {
        Node::EqualsOneOf {
            input: Box::new(self),
            options: Options::List(options.into_iter().collect()),
        }
    }

    /// Membership in a node that evaluates to an array.
    pub fn equals_one_of_collection(self, collection: Node) -> Self {
        Node::EqualsOneOf {
            input: Box::new(self),
            options: Options::Collection(Box::new(collection)),
        }
    }

    pub fn less_than(self, other: impl Into<Node>) -> Self {
        Node::LessThan(Box::new(self), Box::new(other.into()))
    }

    pub fn less_than_eq(self, other: impl Into<Node>) -> Self {
        Node::LessThanEq(Box::new(self), Box::new(other.into()))
    }

    pub fn greater_than(self, other: impl Into<Node>) -> Self {
        other.into().less_than(self)
    }

    pub fn greater_than_eq(self, other: impl Into<Node>) -> Self {
        other.into().less_than_eq(self)
    }

    /// Conjunction of all inputs, reduced left to right. An empty conjunction is `true`.
    pub fn and(inputs: impl IntoIterator<Item = Node>) -> Self {
        Node::And(inputs.into_iter().collect())
    }

    pub fn or(self, other: impl Into<Node>) -> Self {
        Node::Or(Box::new(self), Box::new(other.into()))
    }

    pub fn hash(inputs: impl IntoIterator<Item = Node>) -> Self {
        Node::Hash {
            inputs: inputs.into_iter().collect(),
            prefix: None,
        }
    }

    pub fn hash_with_prefix(
        prefix: impl Into<String>,
        inputs: impl IntoIterator<Item = Node>,
    ) -> Self {
        Node::Hash {
            inputs: inputs.into_iter().collect(),
            prefix: Some(prefix.into()),
        }
    }

    pub fn if_then_else(condition: Node, then_node: Node, else_node: Node) -> Self {
        Node::IfThenElse {
            condition: Box::new(condition),
            then_node: Box::new(then_node),
            else_node: Box::new(else_node),
        }
    }

    pub fn compute<F>(inputs: impl IntoIterator<Item = Node>, output_type: DataType, f: F) -> Self
    where
        F: Fn(&[Value]) -> ComputeResult + Send + Sync + 'static,
    {
        Node::Compute {
            inputs: inputs.into_iter().collect(),
            output_type,
            compute: ComputeFn(Arc::new(f)),
        }
    }

    /// Visit this node and all of its descendants, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        match self {
            Node::Owner | Node::Issuer { .. } | Node::Constant(_) | Node::Root => {}
            Node::Property { inner, .. } | Node::Not(inner) => inner.walk(visit),
            Node::Record(fields) => fields.values().for_each(|n| n.walk(visit)),
            Node::Equals(l, r)
            | Node::LessThan(l, r)
            | Node::LessThanEq(l, r)
            | Node::Add(l, r)
            | Node::Sub(l, r)
            | Node::Mul(l, r)
            | Node::Div(l, r)
            | Node::Or(l, r) => {
                l.walk(visit);
                r.walk(visit);
            }
            Node::EqualsOneOf { input, options } => {
                input.walk(visit);
                match options {
                    Options::List(list) => list.iter().for_each(|n| n.walk(visit)),
                    Options::Collection(n) => n.walk(visit),
                }
            }
            Node::And(inputs) | Node::Hash { inputs, .. } | Node::Compute { inputs, .. } => {
                inputs.iter().for_each(|n| n.walk(visit))
            }
            Node::IfThenElse {
                condition,
                then_node,
                else_node,
            } => {
                condition.walk(visit);
                then_node.walk(visit);
                else_node.walk(visit);
            }
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Constant(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::constant(value)
    }
}

impl From<u8> for Node {
    fn from(value: u8) -> Self {
        Node::constant(value)
    }
}

impl From<u32> for Node {
    fn from(value: u32) -> Self {
        Node::constant(value)
    }
}

impl From<u64> for Node {
    fn from(value: u64) -> Self {
        Node::constant(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::constant(value)
    }
}
