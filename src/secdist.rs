//! The credential bundle handed to the service-under-test, and its canonical JSON form.
//!
//! # The bundle
//!
//! A [`CredentialBundle`] maps a logical [`Alias`] to the [`BrokerConnection`]
//! describing how to reach one broker instance. The service-under-test looks
//! connections up by alias, so aliases must be unique within a bundle; entry
//! order is preserved through serialization.
//!
//! # Validation vs construction
//!
//! Types in this module validate untrusted input through `TryFrom`
//! implementations, which is also the path deserialization takes.
//! The `new` constructors skip validation and exist for values that are
//! known good, such as the fixed local development endpoint.

use derive_more::{AsRef, Display, From};
use derive_new::new;
use getset::{CopyGetters, Getters};
use error_stack::{report, Report, ResultExt};
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Serialize,
};
use typed_builder::TypedBuilder;

use crate::ext::{
    error_stack::{DescribeContext, ErrorHelper, IntoContext},
    result::{WrapErr, WrapOk},
    secrecy::ComparableSecretString,
};

/// The alias under which the fixed local development endpoint is registered.
pub const DEFAULT_ALIAS: &str = "my-rabbit-alias";

/// The host of the local development broker.
pub const LOCAL_HOST: &str = "localhost";

/// The port of the local development broker.
pub const LOCAL_PORT: u16 = 8672;

/// The login for the local development broker.
pub const GUEST_LOGIN: &str = "guest";

/// The password for the local development broker.
pub const GUEST_PASSWORD: &str = "guest";

/// The root virtual host.
pub const ROOT_VHOST: &str = "/";

/// Errors that are possibly surfaced during validation of bundle values.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The provided alias is not valid.
    #[error("validate connection alias")]
    Alias,

    /// The provided host is not valid.
    #[error("validate broker host")]
    Host,

    /// A connection must list at least one host.
    #[error("connection must list at least one host")]
    HostsEmpty,

    /// Ports are validated to the range valid for the network.
    #[error("port must be in the range [1, 65535]")]
    Port,

    /// The value provided to parse is empty.
    #[error("provided value is empty")]
    ValueEmpty,

    /// Aliases are unique within a bundle.
    #[error("alias is already present in the bundle")]
    DuplicateAlias,
}

/// Errors encountered moving a secdist document through its canonical JSON form.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document is serialized when published to the service environment.
    /// If that serialize operation fails, this error is returned.
    #[error("serialize secdist document")]
    Serialize,

    /// When reading a published document back, it is deserialized.
    /// If that deserialize operation fails, this error is returned.
    #[error("deserialize secdist document")]
    Deserialize,
}

/// Logical name identifying one broker connection target within a bundle.
#[derive(Debug, Clone, PartialEq, Eq, AsRef, Display, Serialize, Deserialize, new)]
#[serde(try_from = "String")]
pub struct Alias(String);

impl TryFrom<String> for Alias {
    type Error = Report<ValidationError>;

    fn try_from(input: String) -> Result<Self, Self::Error> {
        if input.is_empty() {
            report!(ValidationError::ValueEmpty)
                .wrap_err()
                .help("the service-under-test looks connections up by alias, so it may not be empty")
                .change_context(ValidationError::Alias)
        } else {
            Alias(input).wrap_ok()
        }
    }
}

/// A single broker host. Hosts have different semantics across deployments,
/// so no attempt is made to parse them as URLs or addresses;
/// they're only validated to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, AsRef, Display, Serialize, Deserialize, new)]
#[serde(try_from = "String")]
pub struct Host(String);

impl TryFrom<String> for Host {
    type Error = Report<ValidationError>;

    fn try_from(input: String) -> Result<Self, Self::Error> {
        if input.is_empty() {
            report!(ValidationError::ValueEmpty)
                .wrap_err()
                .help("provide a hostname or address, for example 'localhost'")
                .change_context(ValidationError::Host)
        } else {
            Host(input).wrap_ok()
        }
    }
}

/// The ordered, non-empty sequence of hosts for one connection.
#[derive(Debug, Clone, PartialEq, Eq, AsRef, Serialize, Deserialize, new)]
#[serde(try_from = "Vec<Host>")]
pub struct Hosts(Vec<Host>);

impl Hosts {
    /// Create an instance with a single host.
    pub fn single(host: Host) -> Self {
        Self(vec![host])
    }

    /// Iterate over the hosts in order.
    pub fn iter(&self) -> impl Iterator<Item = &Host> {
        self.0.iter()
    }
}

impl TryFrom<Vec<Host>> for Hosts {
    type Error = Report<ValidationError>;

    fn try_from(input: Vec<Host>) -> Result<Self, Self::Error> {
        if input.is_empty() {
            report!(ValidationError::HostsEmpty)
                .wrap_err()
                .help("list at least one host the client can connect to")
        } else {
            Hosts(input).wrap_ok()
        }
    }
}

/// A valid network port for a broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize, new)]
#[serde(try_from = "u16")]
pub struct Port(u16);

impl TryFrom<u16> for Port {
    type Error = Report<ValidationError>;

    fn try_from(input: u16) -> Result<Self, Self::Error> {
        if input == 0 {
            report!(ValidationError::Port)
                .wrap_err()
                .describe("provided port: 0")
        } else {
            Port(input).wrap_ok()
        }
    }
}

/// The login used to authenticate against the broker.
#[derive(Debug, Clone, PartialEq, Eq, AsRef, Display, From, Serialize, Deserialize, new)]
pub struct Login(String);

/// The virtual host path on the broker.
#[derive(Debug, Clone, PartialEq, Eq, AsRef, Display, From, Serialize, Deserialize, new)]
pub struct VirtualHost(String);

/// Describes how to reach one broker instance.
///
/// Field order here is the field order of the serialized form;
/// it matches what the service-under-test parses.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters, Serialize, Deserialize, TypedBuilder)]
pub struct BrokerConnection {
    /// The hosts the client may connect to, in preference order.
    #[getset(get = "pub")]
    #[builder(setter(into))]
    hosts: Hosts,

    /// The port the broker listens on.
    #[getset(get_copy = "pub")]
    port: Port,

    /// The login used to authenticate.
    #[getset(get = "pub")]
    #[builder(setter(into))]
    login: Login,

    /// The password used to authenticate.
    /// Redacted in debugging output, serialized in the clear.
    #[getset(get = "pub")]
    #[builder(setter(into))]
    password: ComparableSecretString,

    /// The virtual host to use on the broker.
    #[getset(get = "pub")]
    #[builder(setter(into))]
    vhost: VirtualHost,
}

/// An order-preserving mapping from [`Alias`] to [`BrokerConnection`].
///
/// Aliases are unique within a bundle; [`CredentialBundle::insert`] enforces
/// this, and so does deserialization of a published document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    entries: Vec<(Alias, BrokerConnection)>,
}

impl CredentialBundle {
    /// Create a bundle containing a single connection.
    pub fn single(alias: Alias, connection: BrokerConnection) -> Self {
        Self {
            entries: vec![(alias, connection)],
        }
    }

    /// Add a connection under a new alias, preserving insertion order.
    pub fn insert(
        &mut self,
        alias: Alias,
        connection: BrokerConnection,
    ) -> Result<(), Report<ValidationError>> {
        if self.get(&alias).is_some() {
            return report!(ValidationError::DuplicateAlias)
                .wrap_err()
                .describe_lazy(|| format!("provided alias: '{alias}'"))
                .help("choose a distinct alias for each connection in the bundle");
        }

        self.entries.push((alias, connection));
        Ok(())
    }

    /// Look up a connection by its alias.
    pub fn get(&self, alias: &Alias) -> Option<&BrokerConnection> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == alias)
            .map(|(_, connection)| connection)
    }

    /// Iterate over aliases in insertion order.
    pub fn aliases(&self) -> impl Iterator<Item = &Alias> {
        self.entries.iter().map(|(alias, _)| alias)
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Alias, &BrokerConnection)> {
        self.entries
            .iter()
            .map(|(alias, connection)| (alias, connection))
    }

    /// The number of connections in the bundle.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle contains no connections.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for CredentialBundle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (alias, connection) in &self.entries {
            map.serialize_entry(alias, connection)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CredentialBundle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct BundleVisitor;

        impl<'de> Visitor<'de> for BundleVisitor {
            type Value = CredentialBundle;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map from connection alias to connection settings")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut bundle = CredentialBundle::default();
                while let Some((alias, connection)) =
                    access.next_entry::<Alias, BrokerConnection>()?
                {
                    bundle
                        .insert(alias, connection)
                        .map_err(serde::de::Error::custom)?;
                }
                Ok(bundle)
            }
        }

        deserializer.deserialize_map(BundleVisitor)
    }
}

/// The structured secret/connection document injected into the
/// service-under-test's environment.
///
/// The serialized form is the bit-exact contract the service parses:
/// a JSON object with the bundle under the `rabbitmq_settings` key.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
#[getset(get = "pub")]
pub struct Secdist {
    /// Broker connections, keyed by alias.
    rabbitmq_settings: CredentialBundle,
}

impl Secdist {
    /// The fixed local development document: a single alias pointing at a
    /// broker on localhost with default guest credentials.
    ///
    /// Construction is pure data assembly from known-good constants and cannot fail.
    pub fn default_local() -> Self {
        let connection = BrokerConnection::builder()
            .hosts(Hosts::single(Host::new(String::from(LOCAL_HOST))))
            .port(Port::new(LOCAL_PORT))
            .login(String::from(GUEST_LOGIN))
            .password(String::from(GUEST_PASSWORD))
            .vhost(String::from(ROOT_VHOST))
            .build();
        let alias = Alias::new(String::from(DEFAULT_ALIAS));
        Self::new(CredentialBundle::single(alias, connection))
    }

    /// Serialize the document into its canonical JSON form.
    pub fn to_json(&self) -> Result<String, Report<Error>> {
        serde_json::to_string(self).context(Error::Serialize)
    }

    /// Parse a document from its canonical JSON form.
    pub fn from_json(raw: &str) -> Result<Self, Report<Error>> {
        serde_json::from_str(raw)
            .context(Error::Deserialize)
            .help("the document must be a JSON object with broker connections under 'rabbitmq_settings'")
    }
}
