// Verify the peer envelope wire format matches what other agent daemons
// and the relay expect. These tests ensure protocol compatibility is never
// broken.

use chrono::{TimeZone, Utc};
use majordomo_peers::{keys, Envelope, MessageKind};
use serde_json::Value;

fn fixed_envelope() -> Envelope {
    let mut env = Envelope::new(
        "r2",
        "bmo",
        MessageKind::Text,
        serde_json::json!({"text": "ready"}),
    );
    env.timestamp = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    env.message_id = "11111111-2222-3333-4444-555555555555".to_string();
    env.nonce = "00aa11bb22cc33dd44ee55ff66778899".to_string();
    env
}

#[test]
fn envelope_field_names_are_stable() {
    let env = fixed_envelope();
    let json = serde_json::to_string(&env).unwrap();

    assert!(json.contains(r#""from":"r2""#));
    assert!(json.contains(r#""to":"bmo""#));
    assert!(json.contains(r#""type":"text""#));
    assert!(json.contains(r#""messageId":"11111111-2222-3333-4444-555555555555""#));
    assert!(json.contains(r#""nonce":"00aa11bb22cc33dd44ee55ff66778899""#));
    // Unsigned envelopes omit the signature field entirely.
    assert!(!json.contains(r#""signature""#));
}

#[test]
fn timestamp_is_iso8601() {
    let env = fixed_envelope();
    let value: Value = serde_json::to_value(&env).unwrap();
    let ts = value["timestamp"].as_str().unwrap();
    assert!(ts.starts_with("2025-06-01T12:00:00"));
}

#[test]
fn message_kinds_serialize_kebab_case() {
    for (kind, wire) in [
        (MessageKind::Text, "text"),
        (MessageKind::Status, "status"),
        (MessageKind::Coordination, "coordination"),
        (MessageKind::PrReview, "pr-review"),
        (MessageKind::MemorySync, "memory-sync"),
    ] {
        let env = Envelope::new("a", "b", kind, serde_json::json!({}));
        let value: Value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], wire);
    }
}

#[test]
fn inbound_envelope_with_unknown_fields_parses() {
    // Forward compatibility: peers on newer versions may add fields.
    let json = r#"{
        "from": "calcifer",
        "to": "bmo",
        "type": "coordination",
        "timestamp": "2025-06-01T12:00:00Z",
        "messageId": "m-1",
        "nonce": "n-1",
        "payload": {"action": "claimed \"deploy\""},
        "futureField": 42
    }"#;
    let env: Envelope = serde_json::from_str(json).unwrap();
    assert_eq!(env.kind, MessageKind::Coordination);
    assert_eq!(env.payload["action"], "claimed \"deploy\"");
}

#[test]
fn canonical_form_is_stable_across_field_order() {
    // The same logical envelope arriving with different JSON field order
    // must produce identical canonical bytes — signatures depend on it.
    let a: Envelope = serde_json::from_str(
        r#"{"from":"r2","to":"bmo","type":"text","timestamp":"2025-06-01T12:00:00Z",
            "messageId":"m-1","nonce":"n-1","payload":{"b":2,"a":1}}"#,
    )
    .unwrap();
    let b: Envelope = serde_json::from_str(
        r#"{"payload":{"a":1,"b":2},"nonce":"n-1","messageId":"m-1",
            "timestamp":"2025-06-01T12:00:00Z","type":"text","to":"bmo","from":"r2"}"#,
    )
    .unwrap();

    assert_eq!(
        a.canonical_bytes().unwrap(),
        b.canonical_bytes().unwrap()
    );
}

#[test]
fn signature_survives_a_wire_round_trip() {
    let key = keys::generate();
    let mut env = fixed_envelope();
    env.sign(&key).unwrap();

    let wire = serde_json::to_string(&env).unwrap();
    let parsed: Envelope = serde_json::from_str(&wire).unwrap();
    parsed.verify(&key.verifying_key()).unwrap();
}

#[test]
fn signature_is_base64_ed25519() {
    let key = keys::generate();
    let mut env = fixed_envelope();
    env.sign(&key).unwrap();

    use base64::Engine;
    let raw = base64::engine::general_purpose::STANDARD
        .decode(env.signature.as_deref().unwrap())
        .unwrap();
    assert_eq!(raw.len(), 64);
}
