//! Helpers for generating test values.

use broker_testenv::{
    ext::secrecy::ComparableSecretString,
    fixture::FixtureName,
    secdist::{self, Alias, BrokerConnection, Host, Hosts, Port},
};

#[track_caller]
pub(crate) fn alias(val: &str) -> Alias {
    Alias::new(String::from(val))
}

#[track_caller]
pub(crate) fn host(val: &str) -> Host {
    Host::new(String::from(val))
}

#[track_caller]
pub(crate) fn hosts(vals: &[&str]) -> Hosts {
    let hosts = vals.iter().map(|val| host(val)).collect::<Vec<_>>();
    Hosts::try_from(hosts).expect("must have built non-empty host list")
}

#[track_caller]
pub(crate) fn port(val: u16) -> Port {
    Port::new(val)
}

#[track_caller]
pub(crate) fn secret(val: &str) -> ComparableSecretString {
    ComparableSecretString::from(String::from(val))
}

#[track_caller]
pub(crate) fn fixture_name(val: &str) -> FixtureName {
    FixtureName::from(val)
}

#[track_caller]
pub(crate) fn connection(
    hosts_vals: &[&str],
    port_val: u16,
    login: &str,
    password: &str,
    vhost: &str,
) -> BrokerConnection {
    BrokerConnection::builder()
        .hosts(hosts(hosts_vals))
        .port(port(port_val))
        .login(String::from(login))
        .password(String::from(password))
        .vhost(String::from(vhost))
        .build()
}

/// The connection the default local document is expected to contain.
#[track_caller]
pub(crate) fn local_connection() -> BrokerConnection {
    connection(
        &[secdist::LOCAL_HOST],
        secdist::LOCAL_PORT,
        secdist::GUEST_LOGIN,
        secdist::GUEST_PASSWORD,
        secdist::ROOT_VHOST,
    )
}
