//! Hand-modeled message types for the service's wire schema, plus the
//! generic binder that folds a plain [`Request`](crate::ops::Request) tree
//! onto them.
//!
//! The schema is a fixed external contract (`config.v1` / `drive.v1`); the
//! types here are the Rust analog of the generated protobuf modules the
//! service itself is built from. Messages serialize with the proto3 JSON
//! mapping: lowerCamelCase field names, base64 `bytes`, `uint64` as a
//! decimal string, absent fields omitted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::ops::{Action, MsgBody, Node};

pub mod config;
pub mod drive;

/// A statically-typed schema message the binder can populate by field name.
///
/// Implementations are generated by [`wire_message!`]; binding an unknown
/// field name is always a hard error, never a silent drop.
pub trait WireMessage: Default {
    /// Message name used in schema errors.
    const NAME: &'static str;

    /// Assigns one named field from an encoder node.
    fn bind_field(&mut self, field: &str, value: FieldValue<'_>) -> Result<(), SchemaError>;

    /// Copies every populated field of `other` into `self`.
    ///
    /// This realizes the forwarding-field inlining: contents bound against
    /// the same message type collapse into the current message without an
    /// extra nesting level.
    fn merge(&mut self, other: Self);
}

/// The value being assigned to a message field during binding.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    /// A selector qualifier (host name, shape name, ...); assigned
    /// directly, never recursed into.
    Qualifier(&'a str),
    /// A terminal action; scalar and flag fields take their payload here.
    Action(&'a Action),
    /// A nested selection node; message-typed fields recurse into it.
    Message(&'a MsgBody),
}

impl<'a> FieldValue<'a> {
    fn describe(&self) -> &'static str {
        match self {
            FieldValue::Qualifier(_) => "qualifier",
            FieldValue::Action(a) => a.payload_kind(),
            FieldValue::Message(_) => "nested selection",
        }
    }

    pub(crate) fn qualifier(
        &self,
        message: &'static str,
        field: &'static str,
    ) -> Result<&'a str, SchemaError> {
        match self {
            FieldValue::Qualifier(v) => Ok(v),
            other => Err(SchemaError::PayloadMismatch {
                message,
                field,
                given: other.describe(),
            }),
        }
    }

    pub(crate) fn action(
        &self,
        message: &'static str,
        field: &'static str,
    ) -> Result<&'a Action, SchemaError> {
        match self {
            FieldValue::Action(a) => Ok(a),
            other => Err(SchemaError::PayloadMismatch {
                message,
                field,
                given: other.describe(),
            }),
        }
    }

    pub(crate) fn message(
        &self,
        message: &'static str,
        field: &'static str,
    ) -> Result<&'a MsgBody, SchemaError> {
        match self {
            FieldValue::Message(b) => Ok(b),
            other => Err(SchemaError::PayloadMismatch {
                message,
                field,
                given: other.describe(),
            }),
        }
    }
}

/// Binds an encoder message node onto a fresh instance of `T`.
///
/// Qualifiers assign directly; a direct action lands as a named sibling
/// field; forwarded contents bind against the same type `T` and merge in.
pub fn bind_message<T: WireMessage>(body: &MsgBody) -> Result<T, SchemaError> {
    let mut msg = T::default();
    if let Some(name) = &body.name {
        msg.bind_field("name", FieldValue::Qualifier(name))?;
    }
    if let Some(shape) = &body.shape {
        msg.bind_field("shape", FieldValue::Qualifier(shape))?;
    }
    if let Some(action) = &body.direct {
        msg.bind_field(action.tag(), FieldValue::Action(action))?;
    }
    if let Some(node) = &body.forward {
        let inner = bind_node::<T>(node)?;
        msg.merge(inner);
    }
    Ok(msg)
}

fn bind_node<T: WireMessage>(node: &Node) -> Result<T, SchemaError> {
    let mut msg = T::default();
    match node {
        Node::Action(action) => msg.bind_field(action.tag(), FieldValue::Action(action))?,
        Node::Message { tag, body } => msg.bind_field(tag, FieldValue::Message(body))?,
    }
    Ok(msg)
}

/// `bytes` scalar with proto3 JSON (base64) representation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WireBytes(pub Vec<u8>);

impl From<Vec<u8>> for WireBytes {
    fn from(v: Vec<u8>) -> Self {
        WireBytes(v)
    }
}

impl Serialize for WireBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for WireBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64
            .decode(s.as_bytes())
            .map(WireBytes)
            .map_err(de::Error::custom)
    }
}

/// `uint64` scalar; proto3 JSON writes it as a decimal string but lenient
/// decoders must also accept a bare number.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WireU64(pub u64);

impl From<u64> for WireU64 {
    fn from(v: u64) -> Self {
        WireU64(v)
    }
}

impl Serialize for WireU64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for WireU64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct U64Visitor;

        impl Visitor<'_> for U64Visitor {
            type Value = WireU64;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a uint64 as string or number")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<WireU64, E> {
                Ok(WireU64(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<WireU64, E> {
                v.parse().map(WireU64).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(U64Visitor)
    }
}

/// Maps one field kind to its storage type. All fields are optional so that
/// an unpopulated message serializes to `{}`.
macro_rules! wire_field_ty {
    (qual) => { Option<String> };
    (flag) => { Option<bool> };
    (string) => { Option<String> };
    (bytes) => { Option<$crate::schema::WireBytes> };
    (uint64) => { Option<$crate::schema::WireU64> };
    (slice) => { Option<$crate::schema::config::StringSlice> };
    ($msg:ident) => { Option<$msg> };
}

/// Expands one `bind_field` match arm body per field kind.
macro_rules! wire_bind_arm {
    ($self:ident, $value:ident, $wire:expr, $field:ident, qual) => {{
        $self.$field = Some($value.qualifier(Self::NAME, $wire)?.to_owned());
        Ok(())
    }};
    ($self:ident, $value:ident, $wire:expr, $field:ident, flag) => {{
        let action = $value.action(Self::NAME, $wire)?;
        if action.is_flag() {
            $self.$field = Some(true);
            Ok(())
        } else {
            Err($crate::error::SchemaError::PayloadMismatch {
                message: Self::NAME,
                field: $wire,
                given: action.payload_kind(),
            })
        }
    }};
    ($self:ident, $value:ident, $wire:expr, $field:ident, string) => {{
        match $value.action(Self::NAME, $wire)?.string_payload() {
            Some(v) => {
                $self.$field = Some(v.to_owned());
                Ok(())
            }
            None => Err($crate::error::SchemaError::PayloadMismatch {
                message: Self::NAME,
                field: $wire,
                given: $value.describe(),
            }),
        }
    }};
    ($self:ident, $value:ident, $wire:expr, $field:ident, bytes) => {{
        match $value.action(Self::NAME, $wire)?.bytes_payload() {
            Some(v) => {
                $self.$field = Some($crate::schema::WireBytes(v.to_vec()));
                Ok(())
            }
            None => Err($crate::error::SchemaError::PayloadMismatch {
                message: Self::NAME,
                field: $wire,
                given: $value.describe(),
            }),
        }
    }};
    ($self:ident, $value:ident, $wire:expr, $field:ident, uint64) => {{
        match $value.action(Self::NAME, $wire)?.u64_payload() {
            Some(v) => {
                $self.$field = Some($crate::schema::WireU64(v));
                Ok(())
            }
            None => Err($crate::error::SchemaError::PayloadMismatch {
                message: Self::NAME,
                field: $wire,
                given: $value.describe(),
            }),
        }
    }};
    ($self:ident, $value:ident, $wire:expr, $field:ident, slice) => {{
        match $value.action(Self::NAME, $wire)?.list_payload() {
            Some(v) => {
                $self.$field = Some($crate::schema::config::StringSlice {
                    value: v.to_vec(),
                });
                Ok(())
            }
            None => Err($crate::error::SchemaError::PayloadMismatch {
                message: Self::NAME,
                field: $wire,
                given: $value.describe(),
            }),
        }
    }};
    ($self:ident, $value:ident, $wire:expr, $field:ident, $msg:ident) => {{
        let body = $value.message(Self::NAME, $wire)?;
        $self.$field = Some($crate::schema::bind_message::<$msg>(body)?);
        Ok(())
    }};
}

/// Declares one schema message: the struct, its proto3-JSON serialization,
/// and its [`WireMessage`] binding table.
///
/// Field kinds: `qual` (selector qualifier), `flag` (`bool` variant),
/// `string` / `bytes` / `uint64` / `slice` (scalar variants), or a message
/// type name for nested selections. The string literal is the wire name.
macro_rules! wire_message {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $wire:literal $field:ident : $kind:tt ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
        pub struct $name {
            $(
                #[serde(rename = $wire, skip_serializing_if = "Option::is_none")]
                pub $field: $crate::schema::wire_field_ty!($kind),
            )+
        }

        impl $crate::schema::WireMessage for $name {
            const NAME: &'static str = stringify!($name);

            fn bind_field(
                &mut self,
                field: &str,
                value: $crate::schema::FieldValue<'_>,
            ) -> Result<(), $crate::error::SchemaError> {
                match field {
                    $( $wire => $crate::schema::wire_bind_arm!(self, value, $wire, $field, $kind), )+
                    _ => Err($crate::error::SchemaError::UnknownField {
                        message: Self::NAME,
                        field: field.to_owned(),
                    }),
                }
            }

            fn merge(&mut self, other: Self) {
                $(
                    if other.$field.is_some() {
                        self.$field = other.$field;
                    }
                )+
            }
        }
    };
}

pub(crate) use {wire_bind_arm, wire_field_ty, wire_message};
