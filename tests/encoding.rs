//! End-to-end request encoding: selector paths folded around actions,
//! bound onto the wire messages, and serialized to Connect JSON.

use serde_json::json;

use spore_drive::error::SchemaError;
use spore_drive::ops::{Action, OpPath, Payload, Selector};
use spore_drive::schema::config::{Config, Op, Return};

fn handle() -> Config {
    Config { id: "abc".into() }
}

fn encode(path: &OpPath, action: Action) -> serde_json::Value {
    let request = path.fold(action).unwrap();
    let op = Op::bind(handle(), &request).unwrap();
    serde_json::to_value(&op).unwrap()
}

#[test]
fn nested_string_set_travels_through_forwarding_fields() {
    let path = OpPath::root("hosts")
        .push(Selector::named("select", "host1"))
        .push(Selector::tag("ssh"))
        .push(Selector::tag("address"));
    let value = encode(&path, Action::Set(Payload::Str("1.2.3.4:22".into())));

    assert_eq!(
        value,
        json!({
            "config": {"id": "abc"},
            "hosts": {
                "select": {
                    "name": "host1",
                    "ssh": {
                        "address": {"set": "1.2.3.4:22"}
                    }
                }
            }
        })
    );
}

#[test]
fn port_values_encode_as_decimal_strings() {
    let path = OpPath::root("shapes")
        .push(Selector::named("select", "shape1"))
        .push(Selector::tag("ports"))
        .push(Selector::named("select", "main"));
    let value = encode(&path, Action::Set(Payload::U64(4242)));

    assert_eq!(
        value,
        json!({
            "config": {"id": "abc"},
            "shapes": {
                "select": {
                    "name": "shape1",
                    "ports": {
                        "select": {"name": "main", "set": "4242"}
                    }
                }
            }
        })
    );
}

#[test]
fn delete_lands_directly_on_the_selection() {
    let path = OpPath::root("hosts").push(Selector::named("select", "host1"));
    let value = encode(&path, Action::Delete(None));

    assert_eq!(
        value,
        json!({
            "config": {"id": "abc"},
            "hosts": {
                "select": {"name": "host1", "delete": true}
            }
        })
    );
}

#[test]
fn shape_qualifier_and_list_payload_encode_together() {
    let path = OpPath::root("cloud")
        .push(Selector::tag("p2p"))
        .push(Selector::tag("bootstrap"))
        .push(Selector::shaped("select", "seed"))
        .push(Selector::tag("nodes"));
    let value = encode(&path, Action::Add(vec!["n1".into(), "n2".into()]));

    assert_eq!(
        value,
        json!({
            "config": {"id": "abc"},
            "cloud": {
                "p2p": {
                    "bootstrap": {
                        "select": {
                            "shape": "seed",
                            "nodes": {"add": {"value": ["n1", "n2"]}}
                        }
                    }
                }
            }
        })
    );
}

#[test]
fn bytes_payloads_encode_as_base64() {
    let path = OpPath::root("auth")
        .push(Selector::named("select", "main"))
        .push(Selector::tag("key"))
        .push(Selector::tag("data"));
    let value = encode(&path, Action::Set(Payload::Bytes(vec![1, 2, 3, 4])));

    assert_eq!(
        value["auth"]["select"]["key"]["data"]["set"],
        json!("AQIDBA==")
    );
}

#[test]
fn generate_is_direct_on_its_selection() {
    let path = OpPath::root("cloud")
        .push(Selector::tag("p2p"))
        .push(Selector::tag("swarm"));
    let value = encode(&path, Action::Generate);

    assert_eq!(
        value,
        json!({
            "config": {"id": "abc"},
            "cloud": {
                "p2p": {"swarm": {"generate": true}}
            }
        })
    );
}

#[test]
fn unknown_fields_fail_binding_loudly() {
    let path = OpPath::root("cloud").push(Selector::tag("nope"));
    let request = path.fold(Action::Get).unwrap();
    match Op::bind(handle(), &request) {
        Err(SchemaError::UnknownField { message, field }) => {
            assert_eq!(message, "Cloud");
            assert_eq!(field, "nope");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn set_on_a_selection_without_a_set_field_is_rejected() {
    let path = OpPath::root("hosts").push(Selector::named("select", "h"));
    let request = path
        .fold(Action::Set(Payload::Str("x".into())))
        .unwrap();
    match Op::bind(handle(), &request) {
        Err(SchemaError::UnknownField { message, field }) => {
            assert_eq!(message, "Host");
            assert_eq!(field, "set");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn bad_root_sections_are_rejected() {
    let path = OpPath::root("gondola");
    let request = path.fold(Action::List).unwrap();
    assert!(matches!(
        Op::bind(handle(), &request),
        Err(SchemaError::BadRoot(_))
    ));
}

#[test]
fn return_envelopes_accept_string_and_numeric_uint64() {
    let ret: Return = serde_json::from_str(r#"{"uint64": "4242"}"#).unwrap();
    assert_eq!(ret.uint64.map(|v| v.0), Some(4242));

    let ret: Return = serde_json::from_str(r#"{"uint64": 4242}"#).unwrap();
    assert_eq!(ret.uint64.map(|v| v.0), Some(4242));

    let ret: Return = serde_json::from_str(r#"{"slice": {"value": ["a"]}}"#).unwrap();
    assert_eq!(ret.slice.unwrap().value, vec!["a"]);

    let ret: Return = serde_json::from_str("{}").unwrap();
    assert_eq!(ret, Return::default());
}
