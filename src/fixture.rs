//! A small dependency-ordered fixture harness.
//!
//! # Fixtures
//!
//! A [`Fixture`] is a named unit of test setup: a body producing a shared
//! value, plus declared `requires` edges on other fixtures. The harness
//! resolves a fixture's dependencies before its body runs, so a test that
//! requests a fixture is guaranteed every transitive dependency is already
//! resolved (or the request fails before the test body executes).
//!
//! Registration is explicit: every fixture a session needs is declared up
//! front on a [`HarnessBuilder`], and the dependency graph is validated to
//! be complete and acyclic at [`HarnessBuilder::build`] time, not discovered
//! dynamically at resolution time.
//!
//! # Scopes and memoization
//!
//! A [`Scope::Session`] fixture resolves at most once per [`Harness`]; the
//! value is shared by every later request through the session. A failed
//! session fixture is just as sticky: the failure is recorded and every
//! later request observes it without the body re-running. [`Scope::Function`]
//! fixtures are cleared by [`Harness::end_test`] and re-resolve for the next
//! test.

use std::{
    any::Any,
    collections::HashMap,
    fmt::{Debug, Formatter},
    sync::Arc,
};

use derive_more::{AsRef, Display, From};
use derive_new::new;
use error_stack::{report, Report, ResultExt};
use getset::{CopyGetters, Getters};
use tracing::{debug, warn};

use crate::ext::{
    error_stack::{DescribeContext, ErrorHelper},
    result::WrapErr,
};

/// Errors surfaced while composing a harness from registered fixtures.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// Each fixture name may be registered once.
    #[error("fixture name is already registered")]
    DuplicateFixture,

    /// Every declared dependency must name a registered fixture.
    #[error("fixture requires an unregistered fixture")]
    UnknownDependency,

    /// The dependency graph must be acyclic.
    #[error("fixture dependency graph contains a cycle")]
    DependencyCycle,
}

/// Errors surfaced while resolving a fixture.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The requested fixture is not registered.
    #[error("fixture is not registered")]
    UnknownFixture,

    /// The requested fixture's own body failed, now or earlier in its scope.
    #[error("execute fixture body")]
    FixtureFailed,

    /// An upstream fixture this one requires failed to resolve.
    /// The underlying cause is attached and propagates to the requester;
    /// the requesting body never runs.
    #[error("resolve upstream fixture dependency")]
    DependencyUnavailable,
}

/// Error surfaced by a fixture body.
///
/// Bodies wrap their domain errors into this context;
/// the harness attaches which fixture failed and propagates the cause.
#[derive(Debug, thiserror::Error)]
#[error("fixture setup failed")]
pub struct SetupError;

/// The name under which a fixture is registered and requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, AsRef, Display, From, new)]
pub struct FixtureName(String);

impl From<&str> for FixtureName {
    fn from(value: &str) -> Self {
        Self(String::from(value))
    }
}

/// The lifetime of a resolved fixture value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Scope {
    /// Resolved at most once per harness; shared by all tests in the session.
    Session,

    /// Re-resolved for every test; cleared by [`Harness::end_test`].
    Function,
}

/// The resolution state of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum State {
    /// The fixture has not been requested in the current scope.
    Unresolved,

    /// The fixture's dependencies or body are currently being resolved.
    Resolving,

    /// The fixture resolved successfully; its value is shared for the rest of the scope.
    Resolved,

    /// The fixture failed; the failure is shared for the rest of the scope.
    Failed,
}

/// The value produced by a resolved fixture, shared by every requester.
pub type FixtureValue = Arc<dyn Any + Send + Sync>;

/// The result a fixture body produces.
pub type SetupResult = Result<FixtureValue, Report<SetupError>>;

type FixtureBody = Box<dyn FnMut(&Deps<'_>) -> SetupResult + Send>;

/// Wrap a concrete value into a [`FixtureValue`].
pub fn value<T: Any + Send + Sync>(value: T) -> FixtureValue {
    Arc::new(value)
}

/// A named, dependency-ordered unit of test setup.
#[derive(Getters, CopyGetters)]
pub struct Fixture {
    /// The name under which the fixture is registered.
    #[getset(get = "pub")]
    name: FixtureName,

    /// The lifetime of the resolved value.
    #[getset(get_copy = "pub")]
    scope: Scope,

    /// The fixtures that must resolve before this one's body runs.
    #[getset(get = "pub")]
    requires: Vec<FixtureName>,

    body: FixtureBody,
}

impl Fixture {
    /// Create a session-scoped fixture with the provided body.
    pub fn session(
        name: impl Into<FixtureName>,
        body: impl FnMut(&Deps<'_>) -> SetupResult + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Session,
            requires: Vec::new(),
            body: Box::new(body),
        }
    }

    /// Create a function-scoped fixture with the provided body.
    pub fn function(
        name: impl Into<FixtureName>,
        body: impl FnMut(&Deps<'_>) -> SetupResult + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Function,
            requires: Vec::new(),
            body: Box::new(body),
        }
    }

    /// Declare that the named fixture must resolve before this one.
    pub fn require(mut self, name: impl Into<FixtureName>) -> Self {
        self.requires.push(name.into());
        self
    }
}

impl Debug for Fixture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

/// The view of resolved dependencies handed to a fixture body.
pub struct Deps<'a> {
    values: &'a HashMap<FixtureName, FixtureValue>,
    states: &'a HashMap<FixtureName, State>,
}

impl Deps<'_> {
    /// The value of a resolved dependency, downcast to its concrete type.
    ///
    /// Returns `None` if the fixture hasn't resolved or the type doesn't match.
    pub fn get<T: Any + Send + Sync>(&self, name: &FixtureName) -> Option<Arc<T>> {
        self.values
            .get(name)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// The resolution state of the named fixture.
    ///
    /// A body never observes a declared dependency as [`State::Unresolved`]:
    /// the harness resolves every dependency before the body runs.
    pub fn state(&self, name: &FixtureName) -> State {
        self.states.get(name).copied().unwrap_or(State::Unresolved)
    }
}

/// The explicit registration list from which a [`Harness`] is composed.
#[derive(Debug, Default)]
pub struct HarnessBuilder {
    fixtures: Vec<Fixture>,
}

impl HarnessBuilder {
    /// Register a fixture.
    pub fn register(mut self, fixture: Fixture) -> Self {
        self.fixtures.push(fixture);
        self
    }

    /// Validate the registration list and compose the harness.
    ///
    /// Fails if a name is registered twice, if a declared dependency names an
    /// unregistered fixture, or if the dependency graph contains a cycle.
    pub fn build(self) -> Result<Harness, Report<ComposeError>> {
        let mut defs = HashMap::new();
        for fixture in self.fixtures {
            let name = fixture.name.clone();
            if defs.insert(name.clone(), fixture).is_some() {
                return report!(ComposeError::DuplicateFixture)
                    .wrap_err()
                    .describe_lazy(|| format!("provided fixture: '{name}'"))
                    .help("register each fixture once, under a distinct name");
            }
        }

        for (name, fixture) in &defs {
            for dep in &fixture.requires {
                if !defs.contains_key(dep) {
                    return report!(ComposeError::UnknownDependency)
                        .wrap_err()
                        .describe_lazy(|| format!("fixture '{name}' requires '{dep}'"))
                        .help("register the required fixture before composing the harness");
                }
            }
        }

        detect_cycle(&defs)?;

        debug!(fixtures = defs.len(), "composed fixture harness");
        Ok(Harness {
            defs,
            states: HashMap::new(),
            values: HashMap::new(),
            failures: HashMap::new(),
        })
    }
}

/// Walk the dependency graph depth-first, tracking the path in `visiting`;
/// revisiting a fixture already on the path means the graph has a cycle.
fn detect_cycle(defs: &HashMap<FixtureName, Fixture>) -> Result<(), Report<ComposeError>> {
    fn visit<'a>(
        name: &'a FixtureName,
        defs: &'a HashMap<FixtureName, Fixture>,
        visiting: &mut Vec<&'a FixtureName>,
        done: &mut Vec<&'a FixtureName>,
    ) -> Result<(), Report<ComposeError>> {
        if done.contains(&name) {
            return Ok(());
        }
        if visiting.contains(&name) {
            return report!(ComposeError::DependencyCycle)
                .wrap_err()
                .describe_lazy(|| format!("fixture '{name}' transitively requires itself"));
        }

        visiting.push(name);
        if let Some(fixture) = defs.get(name) {
            for dep in &fixture.requires {
                visit(dep, defs, visiting, done)?;
            }
        }
        visiting.pop();
        done.push(name);
        Ok(())
    }

    let mut visiting = Vec::new();
    let mut done = Vec::new();
    for name in defs.keys() {
        visit(name, defs, &mut visiting, &mut done)?;
    }
    Ok(())
}

/// One test session's resolved fixture graph.
///
/// Resolution is synchronous and test-by-test; fixture bodies may block
/// internally (for example waiting on a broker test double to accept
/// connections), but the harness itself imposes no timeouts, cancellation,
/// or retries.
pub struct Harness {
    defs: HashMap<FixtureName, Fixture>,
    states: HashMap<FixtureName, State>,
    values: HashMap<FixtureName, FixtureValue>,
    failures: HashMap<FixtureName, String>,
}

impl Harness {
    /// The resolution state of the named fixture.
    pub fn state(&self, name: &FixtureName) -> State {
        self.states.get(name).copied().unwrap_or(State::Unresolved)
    }

    /// Resolve the named fixture, resolving its declared dependencies first.
    ///
    /// Already-resolved fixtures return their memoized value; already-failed
    /// fixtures return the recorded failure without re-running the body.
    pub fn resolve(&mut self, name: &FixtureName) -> Result<FixtureValue, Report<ResolveError>> {
        if !self.defs.contains_key(name) {
            return report!(ResolveError::UnknownFixture)
                .wrap_err()
                .describe_lazy(|| format!("requested fixture: '{name}'"))
                .help("fixtures must be registered when the harness is composed");
        }

        match self.state(name) {
            State::Resolved => {
                if let Some(existing) = self.values.get(name) {
                    return Ok(Arc::clone(existing));
                }
            }
            State::Failed => return self.recorded_failure(name),
            // Composition rejects cycles, so re-entry is unreachable through
            // the public API.
            State::Resolving => {
                return report!(ResolveError::FixtureFailed)
                    .wrap_err()
                    .describe_lazy(|| format!("fixture '{name}' is already resolving"));
            }
            State::Unresolved => {}
        }

        debug!(fixture = %name, "resolving fixture");
        self.states.insert(name.clone(), State::Resolving);

        let requires = self
            .defs
            .get(name)
            .map(|fixture| fixture.requires.clone())
            .unwrap_or_default();
        for dep in &requires {
            if let Err(cause) = self.resolve(dep) {
                let rendered = format!("{cause:?}");
                self.record_failure(name, rendered);
                warn!(fixture = %name, dependency = %dep, "fixture dependency unavailable");
                return Err(cause.change_context(ResolveError::DependencyUnavailable))
                    .describe_lazy(|| format!("fixture '{name}' requires '{dep}'"));
            }
        }

        // Registration was checked on entry, so the definition is present.
        let Some(fixture) = self.defs.get_mut(name) else {
            return report!(ResolveError::UnknownFixture)
                .wrap_err()
                .describe_lazy(|| format!("requested fixture: '{name}'"));
        };
        let deps = Deps {
            values: &self.values,
            states: &self.states,
        };
        let outcome = (fixture.body)(&deps);

        match outcome {
            Ok(produced) => {
                self.states.insert(name.clone(), State::Resolved);
                self.values.insert(name.clone(), Arc::clone(&produced));
                debug!(fixture = %name, state = %State::Resolved, "fixture resolved");
                Ok(produced)
            }
            Err(cause) => {
                let rendered = format!("{cause:?}");
                self.record_failure(name, rendered);
                warn!(fixture = %name, state = %State::Failed, "fixture failed");
                Err(cause.change_context(ResolveError::FixtureFailed))
                    .describe_lazy(|| format!("fixture '{name}' failed to set up"))
            }
        }
    }

    /// Clear function-scoped resolutions so the next test starts fresh.
    ///
    /// Session-scoped values and failures are retained: a failed session
    /// fixture poisons every test depending on it for the rest of the session.
    pub fn end_test(&mut self) {
        let function_scoped = self
            .defs
            .iter()
            .filter(|(_, fixture)| fixture.scope == Scope::Function)
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        for name in function_scoped {
            self.states.remove(&name);
            self.values.remove(&name);
            self.failures.remove(&name);
        }
    }

    fn record_failure(&mut self, name: &FixtureName, rendered: String) {
        self.states.insert(name.clone(), State::Failed);
        self.failures.insert(name.clone(), rendered);
    }

    fn recorded_failure(&self, name: &FixtureName) -> Result<FixtureValue, Report<ResolveError>> {
        let cause = self.failures.get(name).cloned().unwrap_or_default();
        report!(ResolveError::FixtureFailed)
            .wrap_err()
            .describe_lazy(|| format!("fixture '{name}' already failed earlier in its scope"))
            .attach_printable_lazy(|| cause)
    }
}

impl Debug for Harness {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("fixtures", &self.defs.len())
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}
