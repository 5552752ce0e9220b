//! JSON encodings of data types, values, nodes and specs.
//!
//! Each encoding is an explicit converter over [serde_json::Value] that rejects unknown fields
//! and unknown tags. Data types and values are tagged with `_type`; nodes and inputs with `type`.
//! A serialized spec travels with the SHA-256 of its JSON, which is checked before the spec is
//! trusted. [serde_json::Map] keeps keys sorted, so the JSON of a spec is canonical.

use std::collections::BTreeMap;

use curve25519_dalek::Scalar;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value as Json};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    credential::{Credential, CredentialSpec},
    error::Error,
    node::{Node, Options},
    signature::PublicKey,
    spec::{Input, Spec},
    value::{CredentialValue, DataType, Value},
};

/// Field elements as lowercase hex of their canonical 32-byte little-endian encoding.
pub mod field_hex {
    use curve25519_dalek::Scalar;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(x: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::field_to_hex(x))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        super::field_from_hex(&encoded).map_err(D::Error::custom)
    }
}

pub fn field_to_hex(x: &Scalar) -> String {
    hex::encode(x.as_bytes())
}

pub fn field_from_hex(encoded: &str) -> Result<Scalar, Error> {
    let bytes: [u8; 32] = hex::decode(encoded)
        .map_err(|e| Error::malformed("field element", e))?
        .try_into()
        .map_err(|_| Error::malformed("field element", "expected 32 bytes"))?;
    Option::from(Scalar::from_canonical_bytes(bytes))
        .ok_or_else(|| Error::malformed("field element", "not canonical"))
}

/// An object whose keys have been checked against an allow-list.
struct Object<'a> {
    what: &'static str,
    map: &'a Map<String, Json>,
}

impl<'a> Object<'a> {
    fn new(what: &'static str, json: &'a Json, allowed: &[&str]) -> Result<Self, Error> {
        let map = json
            .as_object()
            .ok_or_else(|| Error::malformed(what, "expected an object"))?;
        if let Some(unknown) = map.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(Error::malformed(what, format!("unknown field {unknown}")));
        }
        Ok(Self { what, map })
    }

    fn get(&self, key: &str) -> Result<&'a Json, Error> {
        self.map
            .get(key)
            .ok_or_else(|| Error::malformed(self.what, format!("missing field {key}")))
    }

    fn str(&self, key: &str) -> Result<&'a str, Error> {
        self.get(key)?
            .as_str()
            .ok_or_else(|| Error::malformed(self.what, format!("{key} must be a string")))
    }

    fn object(&self, key: &str) -> Result<&'a Map<String, Json>, Error> {
        self.get(key)?
            .as_object()
            .ok_or_else(|| Error::malformed(self.what, format!("{key} must be an object")))
    }

    fn array(&self, key: &str) -> Result<&'a Vec<Json>, Error> {
        self.get(key)?
            .as_array()
            .ok_or_else(|| Error::malformed(self.what, format!("{key} must be an array")))
    }
}

/// Read the tag of a tagged object without checking its other fields.
fn tag<'a>(what: &'static str, json: &'a Json, key: &str) -> Result<&'a str, Error> {
    json.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| Error::malformed(what, format!("missing {key} tag")))
}

pub fn data_type_to_json(data_type: &DataType) -> Json {
    match data_type {
        DataType::Undefined => json!({ "_type": "Undefined" }),
        DataType::Bool => json!({ "_type": "Bool" }),
        DataType::Field => json!({ "_type": "Field" }),
        DataType::UInt8 => json!({ "_type": "UInt8" }),
        DataType::UInt32 => json!({ "_type": "UInt32" }),
        DataType::UInt64 => json!({ "_type": "UInt64" }),
        DataType::String => json!({ "_type": "String" }),
        DataType::Bytes => json!({ "_type": "Bytes" }),
        DataType::PublicKey => json!({ "_type": "PublicKey" }),
        DataType::Array(inner) => json!({ "_type": "Array", "inner": data_type_to_json(inner) }),
        DataType::Record(fields) => {
            let properties: Map<String, Json> = fields
                .iter()
                .map(|(k, t)| (k.clone(), data_type_to_json(t)))
                .collect();
            json!({ "_type": "Record", "properties": properties })
        }
        DataType::Credential(data) => {
            json!({ "_type": "Credential", "data": data_type_to_json(data) })
        }
    }
}

pub fn data_type_from_json(json: &Json) -> Result<DataType, Error> {
    const WHAT: &str = "data type";
    let primitive = |data_type: DataType| -> Result<DataType, Error> {
        Object::new(WHAT, json, &["_type"])?;
        Ok(data_type)
    };
    match tag(WHAT, json, "_type")? {
        "Undefined" => primitive(DataType::Undefined),
        "Bool" => primitive(DataType::Bool),
        "Field" => primitive(DataType::Field),
        "UInt8" => primitive(DataType::UInt8),
        "UInt32" => primitive(DataType::UInt32),
        "UInt64" => primitive(DataType::UInt64),
        "String" => primitive(DataType::String),
        "Bytes" => primitive(DataType::Bytes),
        "PublicKey" => primitive(DataType::PublicKey),
        "Array" => {
            let object = Object::new(WHAT, json, &["_type", "inner"])?;
            Ok(DataType::array(data_type_from_json(object.get("inner")?)?))
        }
        "Record" => {
            let object = Object::new(WHAT, json, &["_type", "properties"])?;
            let fields = object
                .object("properties")?
                .iter()
                .map(|(k, t)| Ok((k.clone(), data_type_from_json(t)?)))
                .collect::<Result<BTreeMap<_, _>, Error>>()?;
            Ok(DataType::Record(fields))
        }
        "Credential" => {
            let object = Object::new(WHAT, json, &["_type", "data"])?;
            Ok(DataType::Credential(Box::new(data_type_from_json(
                object.get("data")?,
            )?)))
        }
        other => Err(Error::UnsupportedType(other.into())),
    }
}

pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Undefined => json!({ "_type": "Undefined" }),
        Value::Bool(b) => json!({ "_type": "Bool", "value": b }),
        Value::Field(x) => json!({ "_type": "Field", "value": field_to_hex(x) }),
        Value::UInt8(x) => json!({ "_type": "UInt8", "value": x }),
        Value::UInt32(x) => json!({ "_type": "UInt32", "value": x }),
        Value::UInt64(x) => json!({ "_type": "UInt64", "value": x.to_string() }),
        Value::String(s) => json!({ "_type": "String", "value": s }),
        Value::Bytes(b) => json!({ "_type": "Bytes", "value": hex::encode(b) }),
        Value::PublicKey(pk) => json!({ "_type": "PublicKey", "value": pk.to_string() }),
        Value::Array { element, items } => json!({
            "_type": "Array",
            "inner": data_type_to_json(element),
            "value": items.iter().map(value_to_json).collect::<Vec<_>>(),
        }),
        Value::Record(fields) => {
            let value: Map<String, Json> = fields
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect();
            json!({ "_type": "Record", "value": value })
        }
        Value::Credential(c) => json!({
            "_type": "Credential",
            "value": {
                "credential": {
                    "owner": c.credential.owner.to_string(),
                    "data": value_to_json(&c.credential.data),
                },
                "issuer": field_to_hex(&c.issuer),
            },
        }),
    }
}

pub fn value_from_json(json: &Json) -> Result<Value, Error> {
    const WHAT: &str = "value";
    let type_tag = tag(WHAT, json, "_type")?;
    if type_tag == "Undefined" {
        Object::new(WHAT, json, &["_type"])?;
        return Ok(Value::Undefined);
    }
    let fields: &[&str] = match type_tag {
        "Array" => &["_type", "inner", "value"],
        _ => &["_type", "value"],
    };
    let object = Object::new(WHAT, json, fields)?;
    let inner = object.get("value")?;
    let mismatch = || Error::malformed(WHAT, format!("invalid {type_tag} value"));

    match type_tag {
        "Bool" => inner.as_bool().map(Value::Bool).ok_or_else(mismatch),
        "Field" => Ok(Value::Field(field_from_hex(
            inner.as_str().ok_or_else(mismatch)?,
        )?)),
        "UInt8" => inner
            .as_u64()
            .and_then(|x| u8::try_from(x).ok())
            .map(Value::UInt8)
            .ok_or_else(mismatch),
        "UInt32" => inner
            .as_u64()
            .and_then(|x| u32::try_from(x).ok())
            .map(Value::UInt32)
            .ok_or_else(mismatch),
        "UInt64" => inner
            .as_str()
            .and_then(|s| s.parse().ok())
            .map(Value::UInt64)
            .ok_or_else(mismatch),
        "String" => inner
            .as_str()
            .map(|s| Value::String(s.into()))
            .ok_or_else(mismatch),
        "Bytes" => inner
            .as_str()
            .and_then(|s| hex::decode(s).ok())
            .map(Value::Bytes)
            .ok_or_else(mismatch),
        "PublicKey" => inner
            .as_str()
            .and_then(|s| hex::decode(s).ok())
            .and_then(|b| PublicKey::from_bytes(&b))
            .map(Value::PublicKey)
            .ok_or_else(mismatch),
        "Array" => {
            let element = data_type_from_json(object.get("inner")?)?;
            let items = inner
                .as_array()
                .ok_or_else(mismatch)?
                .iter()
                .map(value_from_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::array(element, items)?)
        }
        "Record" => {
            let fields = inner
                .as_object()
                .ok_or_else(mismatch)?
                .iter()
                .map(|(k, v)| Ok((k.clone(), value_from_json(v)?)))
                .collect::<Result<BTreeMap<_, _>, Error>>()?;
            Ok(Value::Record(fields))
        }
        "Credential" => {
            let object = Object::new(WHAT, inner, &["credential", "issuer"])?;
            let credential = Object::new(WHAT, object.get("credential")?, &["owner", "data"])?;
            let owner = hex::decode(credential.str("owner")?)
                .ok()
                .and_then(|b| PublicKey::from_bytes(&b))
                .ok_or_else(mismatch)?;
            Ok(Value::Credential(Box::new(CredentialValue {
                credential: Credential {
                    owner,
                    data: value_from_json(credential.get("data")?)?,
                },
                issuer: field_from_hex(object.str("issuer")?)?,
            })))
        }
        other => Err(Error::UnsupportedType(other.into())),
    }
}

pub fn node_to_json(node: &Node) -> Result<Json, Error> {
    let binary = |name: &str, l: &Node, r: &Node| -> Result<Json, Error> {
        Ok(json!({ "type": name, "left": node_to_json(l)?, "right": node_to_json(r)? }))
    };
    let list = |nodes: &[Node]| nodes.iter().map(node_to_json).collect::<Result<Vec<_>, _>>();

    Ok(match node {
        Node::Owner => json!({ "type": "owner" }),
        Node::Issuer { credential_key } => {
            json!({ "type": "issuer", "credentialKey": credential_key })
        }
        Node::Constant(value) => json!({ "type": "constant", "data": value_to_json(value) }),
        Node::Root => json!({ "type": "root" }),
        Node::Property { inner, key } => {
            json!({ "type": "property", "key": key, "inner": node_to_json(inner)? })
        }
        Node::Record(fields) => {
            let data = fields
                .iter()
                .map(|(k, n)| Ok((k.clone(), node_to_json(n)?)))
                .collect::<Result<Map<_, _>, Error>>()?;
            json!({ "type": "record", "data": data })
        }
        Node::Equals(l, r) => binary("equals", l, r)?,
        Node::EqualsOneOf { input, options } => {
            let options = match options {
                Options::List(nodes) => Json::Array(list(nodes)?),
                Options::Collection(node) => node_to_json(node)?,
            };
            json!({ "type": "equalsOneOf", "input": node_to_json(input)?, "options": options })
        }
        Node::LessThan(l, r) => binary("lessThan", l, r)?,
        Node::LessThanEq(l, r) => binary("lessThanEq", l, r)?,
        Node::Add(l, r) => binary("add", l, r)?,
        Node::Sub(l, r) => binary("sub", l, r)?,
        Node::Mul(l, r) => binary("mul", l, r)?,
        Node::Div(l, r) => binary("div", l, r)?,
        Node::And(inputs) => json!({ "type": "and", "inputs": list(inputs)? }),
        Node::Or(l, r) => binary("or", l, r)?,
        Node::Not(inner) => json!({ "type": "not", "inner": node_to_json(inner)? }),
        Node::Hash { inputs, prefix } => match prefix {
            Some(prefix) => json!({ "type": "hash", "inputs": list(inputs)?, "prefix": prefix }),
            None => json!({ "type": "hash", "inputs": list(inputs)? }),
        },
        Node::IfThenElse {
            condition,
            then_node,
            else_node,
        } => json!({
            "type": "ifThenElse",
            "condition": node_to_json(condition)?,
            "thenNode": node_to_json(then_node)?,
            "elseNode": node_to_json(else_node)?,
        }),
        Node::Compute { .. } => {
            return Err(Error::UnsupportedType(
                "compute nodes cannot be serialized".into(),
            ))
        }
    })
}

pub fn node_from_json(json: &Json) -> Result<Node, Error> {
    const WHAT: &str = "node";
    let node_tag = tag(WHAT, json, "type")?;
    let boxed = |object: &Object, key: &str| -> Result<Box<Node>, Error> {
        Ok(Box::new(node_from_json(object.get(key)?)?))
    };
    let list = |nodes: &Vec<Json>| nodes.iter().map(node_from_json).collect::<Result<Vec<_>, _>>();
    let binary = |make: fn(Box<Node>, Box<Node>) -> Node| -> Result<Node, Error> {
        let object = Object::new(WHAT, json, &["type", "left", "right"])?;
        Ok(make(boxed(&object, "left")?, boxed(&object, "right")?))
    };

    match node_tag {
        "owner" => {
            Object::new(WHAT, json, &["type"])?;
            Ok(Node::Owner)
        }
        "issuer" => {
            let object = Object::new(WHAT, json, &["type", "credentialKey"])?;
            Ok(Node::Issuer {
                credential_key: object.str("credentialKey")?.into(),
            })
        }
        "constant" => {
            let object = Object::new(WHAT, json, &["type", "data"])?;
            Ok(Node::Constant(value_from_json(object.get("data")?)?))
        }
        "root" => {
            Object::new(WHAT, json, &["type"])?;
            Ok(Node::Root)
        }
        "property" => {
            let object = Object::new(WHAT, json, &["type", "key", "inner"])?;
            Ok(Node::Property {
                inner: boxed(&object, "inner")?,
                key: object.str("key")?.into(),
            })
        }
        "record" => {
            let object = Object::new(WHAT, json, &["type", "data"])?;
            let fields = object
                .object("data")?
                .iter()
                .map(|(k, n)| Ok((k.clone(), node_from_json(n)?)))
                .collect::<Result<BTreeMap<_, _>, Error>>()?;
            Ok(Node::Record(fields))
        }
        "equals" => binary(Node::Equals),
        "equalsOneOf" => {
            let object = Object::new(WHAT, json, &["type", "input", "options"])?;
            let options = match object.get("options")? {
                Json::Array(nodes) => Options::List(list(nodes)?),
                node => Options::Collection(Box::new(node_from_json(node)?)),
            };
            Ok(Node::EqualsOneOf {
                input: boxed(&object, "input")?,
                options,
            })
        }
        "lessThan" => binary(Node::LessThan),
        "lessThanEq" => binary(Node::LessThanEq),
        "add" => binary(Node::Add),
        "sub" => binary(Node::Sub),
        "mul" => binary(Node::Mul),
        "div" => binary(Node::Div),
        "and" => {
            let object = Object::new(WHAT, json, &["type", "inputs"])?;
            Ok(Node::And(list(object.array("inputs")?)?))
        }
        "or" => binary(Node::Or),
        "not" => {
            let object = Object::new(WHAT, json, &["type", "inner"])?;
            Ok(Node::Not(boxed(&object, "inner")?))
        }
        "hash" => {
            let object = Object::new(WHAT, json, &["type", "inputs", "prefix"])?;
            let prefix = match object.map.get("prefix") {
                Some(_) => Some(object.str("prefix")?.to_string()),
                None => None,
            };
            Ok(Node::Hash {
                inputs: list(object.array("inputs")?)?,
                prefix,
            })
        }
        "ifThenElse" => {
            let object = Object::new(WHAT, json, &["type", "condition", "thenNode", "elseNode"])?;
            Ok(Node::IfThenElse {
                condition: boxed(&object, "condition")?,
                then_node: boxed(&object, "thenNode")?,
                else_node: boxed(&object, "elseNode")?,
            })
        }
        other => Err(Error::UnsupportedType(format!("node {other}"))),
    }
}

pub fn input_to_json(input: &Input) -> Json {
    match input {
        Input::Credential(spec) => {
            let data = data_type_to_json(spec.data_type());
            match spec {
                CredentialSpec::Native { .. } => {
                    json!({ "type": "credential", "credentialType": "native", "data": data })
                }
                CredentialSpec::Recursive { vk_hash, .. } => json!({
                    "type": "credential",
                    "credentialType": "recursive",
                    "vkHash": field_to_hex(vk_hash),
                    "data": data,
                }),
                CredentialSpec::Unsigned { .. } => {
                    json!({ "type": "credential", "credentialType": "unsigned", "data": data })
                }
            }
        }
        Input::Claim(data_type) => json!({ "type": "claim", "data": data_type_to_json(data_type) }),
        Input::Constant(value) => json!({ "type": "constant", "value": value_to_json(value) }),
    }
}

pub fn input_from_json(json: &Json) -> Result<Input, Error> {
    const WHAT: &str = "input";
    match tag(WHAT, json, "type")? {
        "credential" => {
            let kind = tag(WHAT, json, "credentialType")?;
            let fields: &[&str] = match kind {
                "recursive" => &["type", "credentialType", "vkHash", "data"],
                _ => &["type", "credentialType", "data"],
            };
            let object = Object::new(WHAT, json, fields)?;
            let data = data_type_from_json(object.get("data")?)?;
            let spec = match kind {
                "native" => CredentialSpec::Native { data },
                "recursive" => CredentialSpec::Recursive {
                    vk_hash: field_from_hex(object.str("vkHash")?)?,
                    data,
                },
                "unsigned" => CredentialSpec::Unsigned { data },
                other => return Err(Error::UnsupportedType(format!("credential {other}"))),
            };
            Ok(Input::Credential(spec))
        }
        "claim" => {
            let object = Object::new(WHAT, json, &["type", "data"])?;
            Ok(Input::Claim(data_type_from_json(object.get("data")?)?))
        }
        "constant" => {
            let object = Object::new(WHAT, json, &["type", "value"])?;
            Ok(Input::Constant(value_from_json(object.get("value")?)?))
        }
        other => Err(Error::UnsupportedType(format!("input {other}"))),
    }
}

/// Inputs are encoded as an array of `{name, input}` entries, in declaration order.
pub fn spec_to_json(spec: &Spec) -> Result<Json, Error> {
    let inputs: Vec<Json> = spec
        .inputs()
        .iter()
        .map(|(name, input)| json!({ "name": name, "input": input_to_json(input) }))
        .collect();
    Ok(json!({
        "inputs": inputs,
        "assert": node_to_json(spec.assert())?,
        "outputClaim": node_to_json(spec.output_claim())?,
    }))
}

pub fn spec_from_json(json: &Json) -> Result<Spec, Error> {
    let object = Object::new("spec", json, &["inputs", "assert", "outputClaim"])?;
    let inputs = object
        .array("inputs")?
        .iter()
        .map(|entry| {
            let entry = Object::new("spec input", entry, &["name", "input"])?;
            Ok((entry.str("name")?.to_string(), input_from_json(entry.get("input")?)?))
        })
        .collect::<Result<Vec<_>, Error>>()?;
    Spec::from_parts(
        inputs,
        node_from_json(object.get("assert")?)?,
        node_from_json(object.get("outputClaim")?)?,
    )
}

/// A spec in JSON form, with the hash it must match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedSpec {
    pub spec: Json,
    pub hash: String,
}

fn spec_hash(json: &Json) -> Result<String, Error> {
    Ok(hex::encode(Sha256::digest(serde_json::to_vec(json)?)))
}

pub fn serialize_spec(spec: &Spec) -> Result<SerializedSpec, Error> {
    let spec = spec_to_json(spec)?;
    let hash = spec_hash(&spec)?;
    Ok(SerializedSpec { spec, hash })
}

/// Check the hash of a serialized spec, then decode it.
pub fn deserialize_spec(serialized: &SerializedSpec) -> Result<Spec, Error> {
    let hash = spec_hash(&serialized.spec)?;
    if !bool::from(hash.as_bytes().ct_eq(serialized.hash.as_bytes())) {
        tracing::warn!(expected = %serialized.hash, actual = %hash, "spec hash mismatch");
        return Err(Error::SpecIntegrity(format!(
            "expected hash {}, computed {hash}",
            serialized.hash
        )));
    }
    spec_from_json(&serialized.spec)
}

impl SerializedSpec {
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        data_type_to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        data_type_from_json(&Json::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        value_to_json(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        value_from_json(&Json::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

impl Serialize for Spec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        spec_to_json(self)
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Spec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        spec_from_json(&Json::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}
