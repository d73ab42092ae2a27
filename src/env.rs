//! Composition of the process environment handed to the service-under-test.
//!
//! The external launcher applies an [`EnvironmentMap`] to the service process
//! before starting it. This crate publishes exactly one entry: the credential
//! bundle in its canonical JSON form under [`SECDIST_CONFIG`].

use std::collections::BTreeMap;

use delegate::delegate;
use error_stack::{Report, ResultExt};
use tracing::debug;

use crate::{ext::error_stack::DescribeContext, secdist::Secdist};

/// The environment variable under which the serialized credential bundle is published.
///
/// This name is part of the contract with the service-under-test;
/// it reads and parses this variable during startup.
pub const SECDIST_CONFIG: &str = "SECDIST_CONFIG";

/// Errors that are possibly surfaced while composing the service environment.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The credential bundle could not be encoded into the environment value.
    ///
    /// This indicates a configuration construction bug and is fatal to the
    /// whole test session: every test that needs the environment shares it.
    #[error("encode credential bundle into environment value")]
    Encoding,
}

/// A mapping from environment variable name to value.
///
/// Every value is a `String` by construction; structured data is serialized
/// before insertion. Once published to the launcher the map is never mutated,
/// so tests within a session may share it freely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMap(BTreeMap<String, String>);

impl EnvironmentMap {
    delegate! {
        to self.0 {
            /// The number of variables in the map.
            pub fn len(&self) -> usize;

            /// Whether the map contains no variables.
            pub fn is_empty(&self) -> bool;
        }
    }

    /// Set a variable, returning the previous value if one was set.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    /// Look up a variable by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs, for the launcher to apply.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Compose the service environment for the provided secdist document.
///
/// The returned map contains exactly one entry: the document in its canonical
/// JSON form under [`SECDIST_CONFIG`]. Deserializing that value reconstructs
/// a document equal in every field to the provided one.
pub fn service_environment(secdist: &Secdist) -> Result<EnvironmentMap, Report<Error>> {
    let encoded = secdist
        .to_json()
        .change_context(Error::Encoding)
        .describe("the environment value must be representable as JSON text")?;

    let mut environment = EnvironmentMap::default();
    environment.insert(SECDIST_CONFIG, encoded);
    debug!(aliases = secdist.rabbitmq_settings().len(), "composed service environment");
    Ok(environment)
}

/// Compose the service environment for the default local development bundle.
///
/// Builds the credential bundle exactly once and publishes it via
/// [`service_environment`]. Deterministic: repeated calls within a session
/// yield byte-identical values.
pub fn build_service_environment() -> Result<EnvironmentMap, Report<Error>> {
    service_environment(&Secdist::default_local())
}
