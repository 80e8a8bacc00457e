//! `config.v1` message types.
//!
//! The section messages mirror the service schema one-to-one: each carries
//! an optional qualifier (`name` / `shape`) and one variant field per
//! supported operation or nested selection. Simple flag-style operations
//! (delete, generate, list, clear, id) are dedicated sibling fields on the
//! selection message; everything else arrives through the forwarding merge
//! performed by the binder.

use serde::{Deserialize, Serialize};

use super::{WireBytes, WireU64, wire_message};
use crate::error::SchemaError;
use crate::ops::Request;

/// Opaque server-issued configuration session handle.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringSlice {
    #[serde(default)]
    pub value: Vec<String>,
}

/// Filesystem source for `Load`: a root directory on the service host and a
/// path inside it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub root: String,
    pub path: String,
}

/// One frame of a client-streaming `Upload`.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SourceUpload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<WireBytes>,
}

impl SourceUpload {
    pub fn path(path: impl Into<String>) -> Self {
        SourceUpload {
            path: Some(path.into()),
            chunk: None,
        }
    }

    pub fn chunk(data: Vec<u8>) -> Self {
        SourceUpload {
            path: None,
            chunk: Some(WireBytes(data)),
        }
    }
}

/// Archive flavor of a downloaded bundle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleType {
    #[default]
    #[serde(rename = "BUNDLE_TAR")]
    Tar,
    #[serde(rename = "BUNDLE_ZIP")]
    Zip,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BundleConfig {
    pub id: Config,
    #[serde(rename = "type")]
    pub bundle_type: BundleType,
}

/// One frame of a `Download` stream: the first frame announces the bundle
/// type, subsequent frames carry archive chunks.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Bundle {
    #[serde(rename = "type")]
    pub bundle_type: Option<BundleType>,
    pub chunk: Option<WireBytes>,
}

/// Response envelope of `Do`. Exactly one variant is populated on success;
/// a default (all-`None`) value reads as "no value".
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Return {
    pub empty: Option<Empty>,
    pub string: Option<String>,
    pub bytes: Option<WireBytes>,
    pub slice: Option<StringSlice>,
    pub uint64: Option<WireU64>,
}

/// Request envelope of `Do`: the session handle plus exactly one bound
/// section tree.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Op {
    pub config: Config,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud: Option<Cloud>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Hosts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shapes: Option<Shapes>,
}

impl Op {
    /// Binds a folded request onto the envelope. The outermost selector
    /// picks the section; anything else is a schema mismatch.
    pub fn bind(handle: Config, request: &Request) -> Result<Self, SchemaError> {
        let (tag, body) = request.root()?;
        let mut op = Op {
            config: handle,
            ..Op::default()
        };
        match tag {
            "cloud" => op.cloud = Some(super::bind_message(body)?),
            "hosts" => op.hosts = Some(super::bind_message(body)?),
            "auth" => op.auth = Some(super::bind_message(body)?),
            "shapes" => op.shapes = Some(super::bind_message(body)?),
            other => return Err(SchemaError::BadRoot(other.to_owned())),
        }
        Ok(op)
    }
}

wire_message! {
    /// Scalar string operation: `get` or `set`.
    pub struct StringOp {
        "get" get: flag,
        "set" set: string,
    }
}

wire_message! {
    /// Scalar byte-sequence operation: `get` or `set`.
    pub struct BytesOp {
        "get" get: flag,
        "set" set: bytes,
    }
}

wire_message! {
    /// Ordered string-collection operation.
    pub struct StringSliceOp {
        "list" list: flag,
        "set" set: slice,
        "add" add: slice,
        "delete" delete: slice,
        "clear" clear: flag,
    }
}

wire_message! {
    pub struct Cloud {
        "domain" domain: Domain,
        "p2p" p2p: P2p,
    }
}

wire_message! {
    pub struct Domain {
        "root" root: StringOp,
        "generated" generated: StringOp,
        "validation" validation: Validation,
    }
}

wire_message! {
    pub struct Validation {
        "keys" keys: ValidationKeys,
        "generate" generate: flag,
    }
}

wire_message! {
    pub struct ValidationKeys {
        "path" path: ValidationKeysPath,
        "data" data: ValidationKeysData,
    }
}

wire_message! {
    pub struct ValidationKeysPath {
        "privateKey" private_key: StringOp,
        "publicKey" public_key: StringOp,
    }
}

wire_message! {
    pub struct ValidationKeysData {
        "privateKey" private_key: BytesOp,
        "publicKey" public_key: BytesOp,
    }
}

wire_message! {
    pub struct P2p {
        "bootstrap" bootstrap: Bootstrap,
        "swarm" swarm: Swarm,
    }
}

wire_message! {
    pub struct Bootstrap {
        "select" select: BootstrapShape,
        "list" list: flag,
    }
}

wire_message! {
    /// Bootstrap nodes of one shape; selected by the `shape` qualifier.
    pub struct BootstrapShape {
        "shape" shape: qual,
        "nodes" nodes: StringSliceOp,
        "delete" delete: flag,
    }
}

wire_message! {
    pub struct Swarm {
        "key" key: SwarmKey,
        "generate" generate: flag,
    }
}

wire_message! {
    pub struct SwarmKey {
        "path" path: StringOp,
        "data" data: BytesOp,
    }
}

wire_message! {
    pub struct Hosts {
        "select" select: Host,
        "list" list: flag,
    }
}

wire_message! {
    pub struct Host {
        "name" name: qual,
        "addresses" addresses: StringSliceOp,
        "ssh" ssh: Ssh,
        "location" location: StringOp,
        "shapes" shapes: HostShapes,
        "delete" delete: flag,
    }
}

wire_message! {
    pub struct Ssh {
        "address" address: StringOp,
        "auth" auth: StringSliceOp,
    }
}

wire_message! {
    pub struct HostShapes {
        "select" select: HostShape,
        "list" list: flag,
    }
}

wire_message! {
    pub struct HostShape {
        "name" name: qual,
        "select" select: HostInstance,
        "delete" delete: flag,
    }
}

wire_message! {
    pub struct HostInstance {
        "id" id: flag,
        "key" key: StringOp,
        "generate" generate: flag,
    }
}

wire_message! {
    pub struct Auth {
        "select" select: Signer,
        "list" list: flag,
    }
}

wire_message! {
    pub struct Signer {
        "name" name: qual,
        "username" username: StringOp,
        "password" password: StringOp,
        "key" key: SshKey,
        "delete" delete: flag,
    }
}

wire_message! {
    pub struct SshKey {
        "path" path: StringOp,
        "data" data: BytesOp,
    }
}

wire_message! {
    pub struct Shapes {
        "select" select: Shape,
        "list" list: flag,
    }
}

wire_message! {
    pub struct Shape {
        "name" name: qual,
        "services" services: StringSliceOp,
        "ports" ports: Ports,
        "plugins" plugins: StringSliceOp,
        "delete" delete: flag,
    }
}

wire_message! {
    pub struct Ports {
        "select" select: Port,
        "list" list: flag,
    }
}

wire_message! {
    /// A named port of a shape; the value itself is a `uint64`.
    pub struct Port {
        "name" name: qual,
        "get" get: flag,
        "set" set: uint64,
        "delete" delete: flag,
    }
}
