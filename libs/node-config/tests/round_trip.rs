//! Rendering tests against the configuration document contract.

use rstest::rstest;
use sealink_node_config::{
    ConfigBuilder, ConfigLayout, InletDescriptor, NodeConfig, NodeSpec, OutletDescriptor,
    Predicate, DEFAULT_INLET_ROUTE,
};

fn consumer_spec() -> NodeSpec {
    let allow = Predicate::new(r#"(= subject.identifier "abc")"#);

    NodeSpec::new(
        InletDescriptor::new("127.0.0.1:7000", DEFAULT_INLET_ROUTE)
            .avoid_publishing(true)
            .allow(allow.clone())
            .allow_producer(Predicate::identifier_equals("def")),
        OutletDescriptor::new("broker:9092").allow(allow),
    )
    .with_identity("consumer")
    .with_listener("127.0.0.1:6262")
}

#[rstest]
#[case::object(ConfigLayout::Object)]
#[case::list(ConfigLayout::List)]
fn test_rendered_values_survive_reparse(#[case] layout: ConfigLayout) {
    let rendered = ConfigBuilder::new(layout)
        .build(&consumer_spec())
        .unwrap()
        .to_json()
        .unwrap();

    // Structure is quoted by the serializer, content is untouched.
    assert!(rendered.contains(r#""identity":"consumer""#));
    assert!(rendered.contains(r#""tcp-listener-address":"127.0.0.1:6262""#));
    assert!(rendered.contains(r#""allow":"(= subject.identifier \"abc\")""#));

    let parsed = NodeConfig::from_json(&rendered).unwrap();
    assert_eq!(parsed.identity.as_deref(), Some("consumer"));
    assert_eq!(parsed.tcp_listener_address.as_deref(), Some("127.0.0.1:6262"));

    let inlet = parsed.inlet().unwrap();
    assert_eq!(
        inlet.allow.as_ref().map(Predicate::as_str),
        Some(r#"(= subject.identifier "abc")"#)
    );
    assert_eq!(
        inlet.allow_producer.as_ref().map(Predicate::as_str),
        Some(r#"(= subject.identifier "def")"#)
    );
    assert!(inlet.avoid_publishing);
    assert_eq!(parsed.outlet().unwrap().bootstrap_server, "broker:9092");
}

#[test]
fn test_reserved_characters_cannot_break_structure() {
    let hostile = r#"x", "relay": "evil"#;
    let spec = consumer_spec().with_ticket(hostile);

    let rendered = ConfigBuilder::default()
        .build(&spec)
        .unwrap()
        .to_json()
        .unwrap();
    let parsed = NodeConfig::from_json(&rendered).unwrap();

    assert_eq!(parsed.ticket.as_deref(), Some(hostile));
    assert!(parsed.relay.is_none());
}

#[test]
fn test_producer_side_document() {
    let spec = NodeSpec::new(
        InletDescriptor::new("127.0.0.1:7001", DEFAULT_INLET_ROUTE)
            .avoid_publishing(true)
            .with_consumer("/project/default/service/forward_to_consumer/secure/api"),
        OutletDescriptor::new("broker:9092"),
    )
    .with_ticket("ticket-contents")
    .with_relay("consumer")
    .with_listener("127.0.0.1:6263");

    let config = ConfigBuilder::new(ConfigLayout::List).build(&spec).unwrap();
    let value: serde_json::Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();

    assert_eq!(value["ticket"], "ticket-contents");
    assert_eq!(value["relay"], "consumer");
    assert_eq!(
        value["kafka-inlet"][0]["consumer"],
        "/project/default/service/forward_to_consumer/secure/api"
    );
    assert_eq!(value["kafka-outlet"][0]["tls"], false);
}
