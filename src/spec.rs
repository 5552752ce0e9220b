//! Verifier-authored policies.
//!
//! A [Spec] names its inputs, asserts a boolean condition over them, and derives an output claim
//! that is disclosed to the verifier. Specs are built with [Spec::new], which hands the authoring
//! closure one handle node per input.

use std::collections::{BTreeMap, BTreeSet};

use itertools::{EitherOrBoth, Itertools};

use crate::{
    credential::CredentialSpec,
    error::Error,
    eval::{eval_node_type, RootType},
    node::Node,
    value::{DataType, Value},
};

/// Name reserved for the owner of the credentials in a presentation.
pub const RESERVED_OWNER: &str = "owner";

#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    /// A credential of the given kind and data shape, held privately by the owner.
    Credential(CredentialSpec),
    /// A public value supplied with each request.
    Claim(DataType),
    /// A value fixed when the spec is authored.
    Constant(Value),
}

impl Input {
    pub fn credential(spec: CredentialSpec) -> Self {
        Self::Credential(spec)
    }

    pub fn claim(data_type: DataType) -> Self {
        Self::Claim(data_type)
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    /// Type of the input as seen from the root node.
    pub fn data_type(&self) -> DataType {
        match self {
            Input::Credential(spec) => DataType::Credential(Box::new(spec.data_type().clone())),
            Input::Claim(data_type) => data_type.clone(),
            Input::Constant(value) => value.data_type(),
        }
    }
}

/// Handle nodes for the inputs of a spec under construction.
///
/// A credential handle resolves to the credential's data, so it can be passed to [Node::issuer]
/// and its fields read with [Node::get].
#[derive(Clone, Debug)]
pub struct Handles(Vec<(String, Node)>);

impl Handles {
    /// Handle of the named input.
    pub fn input(&self, name: &str) -> Result<Node, Error> {
        self.0
            .iter()
            .find(|(input, _)| input == name)
            .map(|(_, node)| node.clone())
            .ok_or_else(|| Error::SpecConstruction(format!("no input named {name}")))
    }
}

/// What the authoring closure returns.
#[derive(Clone, Debug, Default)]
pub struct Logic {
    assert: Vec<Node>,
    output_claim: Option<Node>,
}

impl Logic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an assertion. Multiple assertions are combined with `and`.
    pub fn assert(mut self, node: Node) -> Self {
        self.assert.push(node);
        self
    }

    pub fn output_claim(mut self, node: Node) -> Self {
        self.output_claim = Some(node);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Spec {
    inputs: Vec<(String, Input)>,
    assert: Node,
    output_claim: Node,
}

impl Spec {
    /// Build a spec over the given inputs, kept in declaration order.
    ///
    /// Without assertions the spec asserts `true`; without an output claim it outputs `undefined`.
    /// Errors returned by `build` are passed through.
    pub fn new<K, F>(inputs: impl IntoIterator<Item = (K, Input)>, build: F) -> Result<Self, Error>
    where
        K: Into<String>,
        F: FnOnce(&Handles) -> Result<Logic, Error>,
    {
        let inputs: Vec<(String, Input)> =
            inputs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        check_input_names(&inputs)?;

        let handles = Handles(
            inputs
                .iter()
                .map(|(name, input)| {
                    let node = Node::root().get(name.as_str());
                    let node = match input {
                        Input::Credential(_) => node.get("data"),
                        _ => node,
                    };
                    (name.clone(), node)
                })
                .collect(),
        );

        let Logic {
            mut assert,
            output_claim,
        } = build(&handles)?;
        let assert = match assert.len() {
            0 => Node::constant(true),
            1 => assert.remove(0),
            _ => Node::and(assert),
        };
        let output_claim = output_claim.unwrap_or_else(Node::undefined);

        Self::from_parts(inputs, assert, output_claim)
    }

    /// Assemble a spec from its parts, checking it the same way [Spec::new] does.
    pub fn from_parts(
        inputs: Vec<(String, Input)>,
        assert: Node,
        output_claim: Node,
    ) -> Result<Self, Error> {
        check_input_names(&inputs)?;
        let spec = Self {
            inputs,
            assert,
            output_claim,
        };

        let root = spec.root_type();
        match eval_node_type(&root, &spec.assert) {
            Ok(DataType::Bool) => {}
            Ok(other) => {
                return Err(Error::SpecConstruction(format!(
                    "assert must be a boolean, found {other:?}"
                )))
            }
            Err(e) => return Err(Error::SpecConstruction(format!("assert: {e}"))),
        }
        eval_node_type(&root, &spec.output_claim)
            .map_err(|e| Error::SpecConstruction(format!("output claim: {e}")))?;

        Ok(spec)
    }

    /// Inputs in declaration order.
    pub fn inputs(&self) -> &[(String, Input)] {
        &self.inputs
    }

    pub fn assert(&self) -> &Node {
        &self.assert
    }

    pub fn output_claim(&self) -> &Node {
        &self.output_claim
    }

    pub fn root_type(&self) -> RootType {
        RootType {
            inputs: self
                .inputs
                .iter()
                .map(|(name, input)| (name.clone(), input.data_type()))
                .collect(),
        }
    }

    /// Type of the disclosed output claim.
    pub fn output_type(&self) -> Result<DataType, Error> {
        Ok(eval_node_type(&self.root_type(), &self.output_claim)?)
    }

    /// Credential inputs, in declaration order.
    pub fn credential_inputs(&self) -> impl Iterator<Item = (&str, &CredentialSpec)> {
        self.inputs.iter().filter_map(|(name, input)| match input {
            Input::Credential(spec) => Some((name.as_str(), spec)),
            _ => None,
        })
    }

    /// Claim inputs and their declared types.
    pub fn claim_types(&self) -> impl Iterator<Item = (&str, &DataType)> {
        self.inputs.iter().filter_map(|(name, input)| match input {
            Input::Claim(data_type) => Some((name.as_str(), data_type)),
            _ => None,
        })
    }

    /// Check that `claims` supplies exactly the declared claims, each with its declared type.
    pub fn check_claims(&self, claims: &BTreeMap<String, Value>) -> Result<(), Error> {
        let declared: BTreeMap<&str, &DataType> = self.claim_types().collect();
        let pairs = declared
            .into_iter()
            .merge_join_by(claims, |(name, _), (key, _)| (*name).cmp(key.as_str()));
        for pair in pairs {
            match pair {
                EitherOrBoth::Both((name, data_type), (_, value)) => {
                    if &value.data_type() != data_type {
                        return Err(Error::ClaimsMismatch(format!(
                            "claim {name} has type {:?}, expected {data_type:?}",
                            value.data_type()
                        )));
                    }
                }
                EitherOrBoth::Left((name, _)) => {
                    return Err(Error::ClaimsMismatch(format!("missing claim {name}")))
                }
                EitherOrBoth::Right((extra, _)) => {
                    return Err(Error::ClaimsMismatch(format!("unexpected claim {extra}")))
                }
            }
        }
        Ok(())
    }

    pub fn constants(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.inputs.iter().filter_map(|(name, input)| match input {
            Input::Constant(value) => Some((name.as_str(), value)),
            _ => None,
        })
    }
}

fn check_input_names(inputs: &[(String, Input)]) -> Result<(), Error> {
    let mut seen = BTreeSet::new();
    for (name, _) in inputs {
        if name == RESERVED_OWNER {
            return Err(Error::SpecConstruction(format!(
                "input name {RESERVED_OWNER:?} is reserved"
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(Error::SpecConstruction(format!("duplicate input {name}")));
        }
    }
    Ok(())
}
