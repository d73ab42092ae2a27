use broker_testenv::secdist::{
    self, Alias, BrokerConnection, CredentialBundle, Host, Hosts, Port, Secdist, ValidationError,
};
use indoc::indoc;
use proptest::prelude::*;
use test_strategy::proptest;

use crate::helper::gen;

#[test]
fn default_document_values() {
    let secdist = Secdist::default_local();
    let bundle = secdist.rabbitmq_settings();

    assert_eq!(bundle.len(), 1);
    let Some(connection) = bundle.get(&gen::alias("my-rabbit-alias")) else {
        panic!("must contain the default alias")
    };
    assert_eq!(connection, &gen::local_connection());
    assert_eq!(connection.hosts(), &gen::hosts(&["localhost"]));
    assert_eq!(connection.port(), gen::port(8672));
    assert_eq!(connection.login(), &secdist::Login::from(String::from("guest")));
    assert_eq!(connection.password(), &gen::secret("guest"));
}

#[test]
fn default_document_invariants() {
    let secdist = Secdist::default_local();
    let bundle = secdist.rabbitmq_settings();

    assert!(!bundle.is_empty(), "alias set must be non-empty");
    for (_, connection) in bundle.iter() {
        assert!(
            connection.hosts().iter().count() > 0,
            "every connection must list at least one host"
        );
        // `Port` holds a `u16`, so the upper bound holds by construction.
        assert!(connection.port() >= gen::port(1));
    }
}

#[test]
fn default_document_serialized_form() {
    let secdist = Secdist::default_local();
    let encoded = secdist.to_json().expect("must have encoded document");

    insta::assert_snapshot!(
        encoded,
        @r#"{"rabbitmq_settings":{"my-rabbit-alias":{"hosts":["localhost"],"port":8672,"login":"guest","password":"guest","vhost":"/"}}}"#
    );
}

#[test]
fn default_document_round_trips() {
    let secdist = Secdist::default_local();
    let encoded = secdist.to_json().expect("must have encoded document");
    let decoded = Secdist::from_json(&encoded).expect("must have decoded document");

    assert_eq!(secdist, decoded);
}

#[test]
fn decodes_published_form() {
    let raw = indoc! {r#"
        {
            "rabbitmq_settings": {
                "my-rabbit-alias": {
                    "hosts": ["localhost"],
                    "port": 8672,
                    "login": "guest",
                    "password": "guest",
                    "vhost": "/"
                }
            }
        }
    "#};

    let decoded = Secdist::from_json(raw).expect("must have decoded document");
    assert_eq!(decoded, Secdist::default_local());
}

#[test]
fn second_alias_serializes_independently() {
    let mut bundle = CredentialBundle::single(gen::alias("my-rabbit-alias"), gen::local_connection());
    bundle
        .insert(
            gen::alias("other-rabbit"),
            gen::connection(&["rabbit.internal"], 5672, "svc", "hunter2", "/svc"),
        )
        .expect("must have inserted distinct alias");
    let secdist = Secdist::new(bundle);

    let encoded = secdist.to_json().expect("must have encoded document");
    let value: serde_json::Value =
        serde_json::from_str(&encoded).expect("must have parsed encoded document");
    let settings = value["rabbitmq_settings"]
        .as_object()
        .expect("settings must be an object");

    assert_eq!(settings.len(), 2);
    assert_eq!(settings["other-rabbit"]["port"], 5672);
    assert_eq!(settings["my-rabbit-alias"]["port"], 8672);

    let decoded = Secdist::from_json(&encoded).expect("must have decoded document");
    assert_eq!(decoded, secdist);
}

#[test]
fn rejects_duplicate_alias_on_insert() {
    let mut bundle = CredentialBundle::single(gen::alias("my-rabbit-alias"), gen::local_connection());
    let err = bundle
        .insert(gen::alias("my-rabbit-alias"), gen::local_connection())
        .expect_err("must have rejected duplicate alias");

    assert!(matches!(
        err.current_context(),
        ValidationError::DuplicateAlias
    ));
}

#[test]
fn rejects_duplicate_alias_on_decode() {
    let raw = r#"{"rabbitmq_settings":{
        "dup":{"hosts":["a"],"port":1,"login":"","password":"","vhost":"/"},
        "dup":{"hosts":["b"],"port":2,"login":"","password":"","vhost":"/"}
    }}"#;

    let err = Secdist::from_json(raw).expect_err("must have rejected duplicate alias");
    assert!(matches!(err.current_context(), secdist::Error::Deserialize));
}

#[test]
fn rejects_empty_alias() {
    let err = Alias::try_from(String::new()).expect_err("must have rejected empty alias");
    assert!(matches!(err.current_context(), ValidationError::Alias));
}

#[test]
fn rejects_empty_host() {
    let err = Host::try_from(String::new()).expect_err("must have rejected empty host");
    assert!(matches!(err.current_context(), ValidationError::Host));
}

#[test]
fn rejects_empty_host_list() {
    let err = Hosts::try_from(Vec::new()).expect_err("must have rejected empty host list");
    assert!(matches!(err.current_context(), ValidationError::HostsEmpty));
}

#[test]
fn rejects_port_zero() {
    let err = Port::try_from(0).expect_err("must have rejected port zero");
    assert!(matches!(err.current_context(), ValidationError::Port));
}

#[test]
fn rejects_port_zero_on_decode() {
    let raw = r#"{"rabbitmq_settings":{
        "a":{"hosts":["localhost"],"port":0,"login":"guest","password":"guest","vhost":"/"}
    }}"#;

    let err = Secdist::from_json(raw).expect_err("must have rejected port zero");
    assert!(matches!(err.current_context(), secdist::Error::Deserialize));
}

fn arb_connection() -> impl Strategy<Value = BrokerConnection> {
    (
        prop::collection::vec("[a-z0-9.-]{1,16}", 1..4),
        1u16..=u16::MAX,
        "[ -~]{0,16}",
        "[ -~]{0,16}",
        "[ -~]{0,16}",
    )
        .prop_map(|(hosts, port, login, password, vhost)| {
            let hosts = hosts.into_iter().map(Host::new).collect::<Vec<_>>();
            BrokerConnection::builder()
                .hosts(Hosts::try_from(hosts).expect("generated host list is non-empty"))
                .port(Port::new(port))
                .login(login)
                .password(password)
                .vhost(vhost)
                .build()
        })
}

fn arb_secdist() -> impl Strategy<Value = Secdist> {
    prop::collection::btree_map("[a-z-]{1,12}", arb_connection(), 1..4).prop_map(|entries| {
        let mut bundle = CredentialBundle::default();
        for (alias, connection) in entries {
            bundle
                .insert(Alias::new(alias), connection)
                .expect("aliases drawn from a map are unique");
        }
        Secdist::new(bundle)
    })
}

/// Round-trip law: any conforming document survives serialize/deserialize
/// with every field intact, not only the fixed default.
#[proptest]
fn any_document_round_trips(#[strategy(arb_secdist())] secdist: Secdist) {
    let encoded = secdist.to_json().expect("must have encoded document");
    let decoded = Secdist::from_json(&encoded).expect("must have decoded document");
    prop_assert_eq!(secdist, decoded);
}
