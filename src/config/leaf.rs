//! Leaf value primitives of the configuration tree.
//!
//! Every terminal wrapper bottoms out in one of four value kinds: string,
//! bytes, string collection, or unsigned integer. The leaves fold their
//! path around an action, run it through the session, and interpret the
//! response envelope. Interpretation is split out as plain functions so it
//! can be exercised without a live session.

use std::sync::Arc;

use crate::config::Session;
use crate::error::{Error, Result};
use crate::ops::{Action, OpPath, Payload};
use crate::schema::config::Return;

/// A string-valued leaf, e.g. a domain name or a file path.
#[derive(Clone)]
pub struct StringLeaf {
    session: Arc<Session>,
    path: OpPath,
}

impl StringLeaf {
    pub(crate) fn new(session: Arc<Session>, path: OpPath) -> Self {
        StringLeaf { session, path }
    }

    pub async fn get(&self) -> Result<String> {
        let ret = self.session.run(&self.path, Action::Get).await?;
        string_value(ret, &self.path)
    }

    pub async fn set(&self, value: impl Into<String>) -> Result<()> {
        self.session
            .run(&self.path, Action::Set(Payload::Str(value.into())))
            .await?;
        Ok(())
    }
}

/// A bytes-valued leaf, e.g. key material.
#[derive(Clone)]
pub struct BytesLeaf {
    session: Arc<Session>,
    path: OpPath,
}

impl BytesLeaf {
    pub(crate) fn new(session: Arc<Session>, path: OpPath) -> Self {
        BytesLeaf { session, path }
    }

    pub async fn get(&self) -> Result<Vec<u8>> {
        let ret = self.session.run(&self.path, Action::Get).await?;
        bytes_value(ret, &self.path)
    }

    pub async fn set(&self, value: Vec<u8>) -> Result<()> {
        self.session
            .run(&self.path, Action::Set(Payload::Bytes(value)))
            .await?;
        Ok(())
    }
}

/// An ordered string-collection leaf, e.g. addresses or service names.
#[derive(Clone)]
pub struct ListLeaf {
    session: Arc<Session>,
    path: OpPath,
}

impl ListLeaf {
    pub(crate) fn new(session: Arc<Session>, path: OpPath) -> Self {
        ListLeaf { session, path }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let ret = self.session.run(&self.path, Action::List).await?;
        Ok(list_value(ret))
    }

    pub async fn set(&self, values: Vec<String>) -> Result<()> {
        self.session
            .run(&self.path, Action::Set(Payload::List(values)))
            .await?;
        Ok(())
    }

    pub async fn add(&self, values: Vec<String>) -> Result<()> {
        self.session
            .run(&self.path, Action::Add(values))
            .await?;
        Ok(())
    }

    pub async fn delete(&self, values: Vec<String>) -> Result<()> {
        self.session
            .run(&self.path, Action::Delete(Some(values)))
            .await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.session.run(&self.path, Action::Clear).await?;
        Ok(())
    }
}

/// An unsigned-integer leaf; used for port values.
#[derive(Clone)]
pub struct U64Leaf {
    session: Arc<Session>,
    path: OpPath,
}

impl U64Leaf {
    pub(crate) fn new(session: Arc<Session>, path: OpPath) -> Self {
        U64Leaf { session, path }
    }

    pub async fn get(&self) -> Result<u64> {
        let ret = self.session.run(&self.path, Action::Get).await?;
        u64_value(ret, &self.path)
    }

    pub async fn set(&self, value: u64) -> Result<()> {
        self.session
            .run(&self.path, Action::Set(Payload::U64(value)))
            .await?;
        Ok(())
    }
}

pub(crate) fn string_value(ret: Return, path: &OpPath) -> Result<String> {
    ret.string.ok_or_else(|| Error::ValueNotSet {
        kind: "string",
        path: path.dotted(),
    })
}

pub(crate) fn bytes_value(ret: Return, path: &OpPath) -> Result<Vec<u8>> {
    ret.bytes.map(|b| b.0).ok_or_else(|| Error::ValueNotSet {
        kind: "bytes",
        path: path.dotted(),
    })
}

pub(crate) fn u64_value(ret: Return, path: &OpPath) -> Result<u64> {
    ret.uint64.map(|v| v.0).ok_or_else(|| Error::ValueNotSet {
        kind: "uint64",
        path: path.dotted(),
    })
}

/// A missing collection reads as empty rather than an error.
pub(crate) fn list_value(ret: Return) -> Vec<String> {
    ret.slice.map(|s| s.value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::config::StringSlice;
    use crate::schema::{WireBytes, WireU64};

    fn path() -> OpPath {
        OpPath::root("cloud").push(crate::ops::Selector::tag("domain"))
    }

    #[test]
    fn populated_variants_are_extracted() {
        let ret = Return {
            string: Some("example.com".into()),
            ..Return::default()
        };
        assert_eq!(string_value(ret, &path()).unwrap(), "example.com");

        let ret = Return {
            bytes: Some(WireBytes(vec![1, 2, 3])),
            ..Return::default()
        };
        assert_eq!(bytes_value(ret, &path()).unwrap(), vec![1, 2, 3]);

        let ret = Return {
            uint64: Some(WireU64(4242)),
            ..Return::default()
        };
        assert_eq!(u64_value(ret, &path()).unwrap(), 4242);
    }

    #[test]
    fn missing_scalars_name_the_path() {
        match string_value(Return::default(), &path()) {
            Err(Error::ValueNotSet { kind, path }) => {
                assert_eq!(kind, "string");
                assert_eq!(path, "cloud.domain");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            u64_value(Return::default(), &path()),
            Err(Error::ValueNotSet { kind: "uint64", .. })
        ));
    }

    #[test]
    fn missing_collections_read_as_empty() {
        assert!(list_value(Return::default()).is_empty());
        let ret = Return {
            slice: Some(StringSlice {
                value: vec!["a".into(), "b".into()],
            }),
            ..Return::default()
        };
        assert_eq!(list_value(ret), vec!["a", "b"]);
    }
}
