//! Operation paths and the request encoder.
//!
//! A traversal of the configuration tree accumulates an [`OpPath`]: an
//! immutable, append-only chain of [`Selector`]s, outermost section first.
//! Issuing a terminal [`Action`] folds the path around it into a single
//! nested [`Request`] tree, which the schema binder then lays onto the
//! typed wire messages.

use crate::error::SchemaError;

/// One step of a configuration path: a schema discriminant plus an optional
/// qualifier naming the selected entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub tag: &'static str,
    pub name: Option<String>,
    pub shape: Option<String>,
}

impl Selector {
    pub fn tag(tag: &'static str) -> Self {
        Selector {
            tag,
            name: None,
            shape: None,
        }
    }

    /// A `select` step qualified by entry name (host, signer, shape, port).
    pub fn named(tag: &'static str, name: impl Into<String>) -> Self {
        Selector {
            tag,
            name: Some(name.into()),
            shape: None,
        }
    }

    /// A `select` step qualified by shape identifier (bootstrap).
    pub fn shaped(tag: &'static str, shape: impl Into<String>) -> Self {
        Selector {
            tag,
            name: None,
            shape: Some(shape.into()),
        }
    }
}

/// Payload carried by a parameterized action.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<String>),
    U64(u64),
}

/// The terminal operation applied at the end of a selector chain.
///
/// Delete, generate, list, clear and id are "direct" kinds: at the
/// innermost selection they encode as dedicated sibling fields of the
/// selection message. Get, set and add always travel through the generic
/// forwarding field instead, including at the innermost position.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Get,
    Set(Payload),
    Add(Vec<String>),
    Delete(Option<Vec<String>>),
    List,
    Clear,
    Generate,
    Id,
}

impl Action {
    /// The wire field name this action binds to.
    pub fn tag(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Set(_) => "set",
            Action::Add(_) => "add",
            Action::Delete(_) => "delete",
            Action::List => "list",
            Action::Clear => "clear",
            Action::Generate => "generate",
            Action::Id => "id",
        }
    }

    pub(crate) fn is_direct(&self) -> bool {
        matches!(
            self,
            Action::Delete(_) | Action::Generate | Action::List | Action::Clear | Action::Id
        )
    }

    /// True for actions a `bool` variant field can absorb.
    pub(crate) fn is_flag(&self) -> bool {
        matches!(
            self,
            Action::Get
                | Action::List
                | Action::Clear
                | Action::Generate
                | Action::Id
                | Action::Delete(None)
        )
    }

    pub(crate) fn string_payload(&self) -> Option<&str> {
        match self {
            Action::Set(Payload::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn bytes_payload(&self) -> Option<&[u8]> {
        match self {
            Action::Set(Payload::Bytes(b)) => Some(b),
            _ => None,
        }
    }

    pub(crate) fn u64_payload(&self) -> Option<u64> {
        match self {
            Action::Set(Payload::U64(v)) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn list_payload(&self) -> Option<&[String]> {
        match self {
            Action::Set(Payload::List(v)) => Some(v),
            Action::Add(v) => Some(v),
            Action::Delete(Some(v)) => Some(v),
            _ => None,
        }
    }

    /// Human-readable payload kind, for schema mismatch errors.
    pub(crate) fn payload_kind(&self) -> &'static str {
        match self {
            Action::Set(Payload::Str(_)) => "string payload",
            Action::Set(Payload::Bytes(_)) => "bytes payload",
            Action::Set(Payload::List(_)) | Action::Add(_) | Action::Delete(Some(_)) => {
                "list payload"
            }
            Action::Set(Payload::U64(_)) => "uint64 payload",
            _ => "flag",
        }
    }
}

/// An immutable chain of selectors, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpPath(Vec<Selector>);

impl OpPath {
    pub fn root(tag: &'static str) -> Self {
        OpPath(vec![Selector::tag(tag)])
    }

    /// Returns a new path with one more selector appended; the original is
    /// untouched, so sibling wrappers never observe each other's steps.
    #[must_use]
    pub fn push(&self, selector: Selector) -> Self {
        let mut steps = self.0.clone();
        steps.push(selector);
        OpPath(steps)
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.0
    }

    /// Dotted rendering for diagnostics, e.g. `cloud.domain.root`.
    pub fn dotted(&self) -> String {
        self.0
            .iter()
            .map(|s| match (&s.name, &s.shape) {
                (Some(n), _) => format!("{}[{}]", s.tag, n),
                (_, Some(sh)) => format!("{}[{}]", s.tag, sh),
                _ => s.tag.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Folds the path around a terminal action, innermost selector first.
    ///
    /// Direct-kind actions land as a named field of the innermost selection
    /// node; everything else, and every outer level, wraps the accumulated
    /// node under the forwarding field.
    pub fn fold(&self, action: Action) -> Result<Request, SchemaError> {
        let mut steps = self.0.iter().rev();
        let innermost = steps.next().ok_or(SchemaError::EmptyPath)?;

        let mut node = if action.is_direct() {
            Node::Message {
                tag: innermost.tag,
                body: MsgBody {
                    name: innermost.name.clone(),
                    shape: innermost.shape.clone(),
                    direct: Some(action),
                    forward: None,
                },
            }
        } else {
            Node::Message {
                tag: innermost.tag,
                body: MsgBody {
                    name: innermost.name.clone(),
                    shape: innermost.shape.clone(),
                    direct: None,
                    forward: Some(Box::new(Node::Action(action))),
                },
            }
        };

        for step in steps {
            node = Node::Message {
                tag: step.tag,
                body: MsgBody {
                    name: step.name.clone(),
                    shape: step.shape.clone(),
                    direct: None,
                    forward: Some(Box::new(node)),
                },
            };
        }

        Ok(Request(node))
    }
}

/// One node of the folded request tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// The terminal action, reached through forwarding fields.
    Action(Action),
    /// A selection message value under its schema discriminant.
    Message { tag: &'static str, body: MsgBody },
}

/// The value of a selection node: optional qualifiers, plus either a direct
/// terminal action or a forwarded inner node (never both).
#[derive(Debug, Clone, PartialEq)]
pub struct MsgBody {
    pub name: Option<String>,
    pub shape: Option<String>,
    pub direct: Option<Action>,
    pub forward: Option<Box<Node>>,
}

/// A fully folded request: exactly one action wrapped by the selector
/// chain, ready for binding. Consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct Request(Node);

impl Request {
    /// The outermost section discriminant and its body.
    pub fn root(&self) -> Result<(&'static str, &MsgBody), SchemaError> {
        match &self.0 {
            Node::Message { tag, body } => Ok((tag, body)),
            Node::Action(_) => Err(SchemaError::EmptyPath),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body<'a>(node: &'a Node, tag: &str) -> &'a MsgBody {
        match node {
            Node::Message { tag: t, body } if *t == tag => body,
            other => panic!("expected message node '{tag}', got {other:?}"),
        }
    }

    #[test]
    fn direct_kinds_land_on_innermost_selection() {
        for action in [
            Action::Delete(None),
            Action::Generate,
            Action::List,
            Action::Clear,
            Action::Id,
        ] {
            let path = OpPath::root("hosts").push(Selector::named("select", "h1"));
            let request = path.fold(action.clone()).unwrap();
            let (tag, outer) = request.root().unwrap();
            assert_eq!(tag, "hosts");
            assert!(outer.direct.is_none());

            let inner = body(outer.forward.as_deref().unwrap(), "select");
            assert_eq!(inner.name.as_deref(), Some("h1"));
            assert_eq!(inner.direct.as_ref(), Some(&action));
            assert!(inner.forward.is_none());
        }
    }

    #[test]
    fn get_set_add_always_forward() {
        let actions = [
            Action::Get,
            Action::Set(Payload::Str("x".into())),
            Action::Add(vec!["a".into()]),
        ];
        for action in actions {
            let path = OpPath::root("cloud").push(Selector::tag("domain"));
            let request = path.fold(action.clone()).unwrap();
            let (_, outer) = request.root().unwrap();
            let inner = body(outer.forward.as_deref().unwrap(), "domain");
            assert!(inner.direct.is_none());
            assert_eq!(
                inner.forward.as_deref(),
                Some(&Node::Action(action)),
                "non-direct action must sit under the forwarding field"
            );
        }
    }

    #[test]
    fn selector_order_is_preserved_outermost_first() {
        let path = OpPath::root("cloud")
            .push(Selector::tag("p2p"))
            .push(Selector::tag("bootstrap"))
            .push(Selector::shaped("select", "seed"))
            .push(Selector::tag("nodes"));
        let request = path.fold(Action::Set(Payload::List(vec!["n1".into()]))).unwrap();

        let (tag, mut b) = request.root().unwrap();
        assert_eq!(tag, "cloud");
        for expected in ["p2p", "bootstrap", "select", "nodes"] {
            b = body(b.forward.as_deref().unwrap(), expected);
        }
        assert_eq!(
            b.forward.as_deref(),
            Some(&Node::Action(Action::Set(Payload::List(vec!["n1".into()]))))
        );
    }

    #[test]
    fn push_leaves_the_original_path_untouched() {
        let base = OpPath::root("hosts");
        let child = base.push(Selector::named("select", "h1"));
        assert_eq!(base.selectors().len(), 1);
        assert_eq!(child.selectors().len(), 2);
        assert_eq!(child.dotted(), "hosts.select[h1]");
    }

    #[test]
    fn folding_an_empty_path_is_rejected() {
        assert!(matches!(
            OpPath::default().fold(Action::List),
            Err(SchemaError::EmptyPath)
        ));
    }

    #[test]
    fn delete_with_payload_is_still_direct() {
        let path = OpPath::root("hosts")
            .push(Selector::named("select", "h1"))
            .push(Selector::tag("addresses"));
        let request = path
            .fold(Action::Delete(Some(vec!["1.2.3.4/32".into()])))
            .unwrap();
        let (_, outer) = request.root().unwrap();
        let host = body(outer.forward.as_deref().unwrap(), "select");
        let addresses = body(host.forward.as_deref().unwrap(), "addresses");
        assert!(addresses.direct.is_some());
    }
}
