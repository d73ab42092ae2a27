//! The statically declared fixture set for broker-backed service tests.
//!
//! This module is the composition root for broker test infrastructure:
//! instead of discovering plugins at runtime, a test session declares the
//! exact fixtures it needs here. The broker test double itself is supplied
//! by the caller under the [`BROKER_FIXTURE`] name; this module contributes
//! the session environment and the per-test dependency declaration.

use error_stack::{Report, ResultExt};

use crate::{
    env,
    fixture::{self, ComposeError, Fixture, Harness, HarnessBuilder, SetupError},
};

/// The fixture providing a running or simulated broker instance.
/// Supplied externally; tests that touch the broker depend on it
/// through [`CLIENT_DEPS_FIXTURE`].
pub const BROKER_FIXTURE: &str = "rabbitmq";

/// The session-scoped fixture producing the service environment.
pub const SERVICE_ENV_FIXTURE: &str = "service_env";

/// The function-scoped fixture tests request to guarantee broker-backed
/// client dependencies are ready before their body runs.
pub const CLIENT_DEPS_FIXTURE: &str = "client_deps";

/// The session-scoped fixture producing the [`env::EnvironmentMap`]
/// for the service-under-test.
///
/// Resolved once per session; the launcher applies the value to the service
/// process, and every test in the session shares it.
pub fn service_env() -> Fixture {
    Fixture::session(SERVICE_ENV_FIXTURE, |_| {
        let environment = env::build_service_environment().change_context(SetupError)?;
        Ok(fixture::value(environment))
    })
}

/// The per-test dependency declaration for broker-backed clients.
///
/// Produces no meaningful value; its effect is purely structural. Requesting
/// it forces [`BROKER_FIXTURE`] to resolve first, and if the broker fixture
/// fails, the requesting test observes the failure with the underlying cause
/// attached and its body never runs.
pub fn client_deps() -> Fixture {
    Fixture::function(CLIENT_DEPS_FIXTURE, |_| Ok(fixture::value(()))).require(BROKER_FIXTURE)
}

/// Compose the standard broker test harness around the provided broker fixture.
///
/// The supplied fixture must be registered under [`BROKER_FIXTURE`];
/// composition fails otherwise, since [`client_deps`] requires that name.
pub fn harness(broker: Fixture) -> Result<Harness, Report<ComposeError>> {
    HarnessBuilder::default()
        .register(broker)
        .register(service_env())
        .register(client_deps())
        .build()
}
