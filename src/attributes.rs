//! Rust types as credential data.
//!
//! [TypedValue] maps a Rust type to a [DataType] and its values to [Value]s. [Attributes] is
//! implemented for structs by `#[derive(Attributes)]`, turning each named field into a record
//! field labelled by its name.

use curve25519_dalek::Scalar;

use crate::{
    signature::PublicKey,
    value::{DataType, Value},
};

pub trait TypedValue {
    fn data_type() -> DataType;

    fn to_value(&self) -> Value;
}

pub trait Attributes: TypedValue {
    fn label_at(i: usize) -> Option<&'static str>;

    fn attribute_labels() -> impl Iterator<Item = &'static str> {
        (0..).map_while(Self::label_at)
    }
}

macro_rules! impl_typed_value {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl TypedValue for $t {
                fn data_type() -> DataType {
                    DataType::$variant
                }

                fn to_value(&self) -> Value {
                    Value::from(self.clone())
                }
            }
        )*
    };
}

impl_typed_value! {
    bool => Bool,
    u8 => UInt8,
    u32 => UInt32,
    u64 => UInt64,
    Scalar => Field,
    String => String,
    PublicKey => PublicKey,
}

impl<T: TypedValue> TypedValue for Vec<T> {
    fn data_type() -> DataType {
        DataType::array(T::data_type())
    }

    fn to_value(&self) -> Value {
        Value::Array {
            element: T::data_type(),
            items: self.iter().map(T::to_value).collect(),
        }
    }
}
