//! Where modules come from.
//!
//! A [`ModuleSource`] enumerates module paths and declares a module's tests, fixture and resources
//! into a [`ModuleScope`]. [`Suite`] is the registration-based source used by harness binaries: each
//! module is a declaration closure keyed by its path, and named configuration entrypoints prepare the
//! engine before the run.

use std::any::Any;
use std::fmt;

use crate::engine::Engine;
use crate::error::TestError;
use crate::fixture::Fixture;
use crate::registry::{Module, TestObject};
use crate::resources::{produce, Args, Callable, ResourceGraph};

/// Supplies modules to the execution loop.
pub trait ModuleSource {
    /// Every module path this source can load, in declaration order.
    fn module_paths(&self) -> Vec<String>;

    /// Declares the module at `path` into `scope`.
    fn load(&self, path: &str, scope: &mut ModuleScope<'_>) -> Result<(), TestError>;
}

/// Declaration-time view of a module and the engine's namespaces.
pub struct ModuleScope<'a> {
    module: &'a mut Module,
    resources: &'a mut ResourceGraph,
    utilities: &'a ResourceGraph,
}

impl<'a> ModuleScope<'a> {
    pub fn new(
        module: &'a mut Module,
        resources: &'a mut ResourceGraph,
        utilities: &'a ResourceGraph,
    ) -> Self {
        Self {
            module,
            resources,
            utilities,
        }
    }

    pub fn path(&self) -> &str {
        self.module.path()
    }

    /// Declares a test.
    pub fn test(&mut self, callable: Callable) -> Result<&mut TestObject, TestError> {
        self.module.add_test(callable)
    }

    /// The module's fixture, created on first use.
    pub fn fixture(&mut self) -> &mut Fixture {
        self.module.fixture_mut()
    }

    pub fn setup(&mut self, callable: Callable) -> Result<(), TestError> {
        self.fixture().set_setup(callable).map(|_| ())
    }

    pub fn reset(&mut self, callable: Callable) -> Result<(), TestError> {
        self.fixture().set_reset(callable).map(|_| ())
    }

    pub fn cleanup(&mut self, callable: Callable) -> Result<(), TestError> {
        self.fixture().set_cleanup(callable).map(|_| ())
    }

    /// A utility injected by the engine.
    pub fn utility<T: Any>(&self, name: &str) -> Result<&T, TestError> {
        self.utilities.get_as(name)
    }

    pub fn add_resource<T: Any>(&mut self, name: impl Into<String>, value: T) {
        self.resources.add(name, value);
    }

    /// Registers the value built by `factory`, whose own parameters are resolved as resources.
    pub fn add_resource_with<T, F>(
        &mut self,
        name: impl Into<String>,
        params: &[&str],
        factory: F,
    ) -> Result<(), TestError>
    where
        T: Any,
        F: FnOnce(&Args) -> Result<T, TestError>,
    {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        let value = produce(&params, &*self.resources, factory)?;
        self.resources.add(name, value);
        Ok(())
    }

    /// Resource lookup, for declarations that depend on earlier registrations.
    pub fn resource<T: Any>(&self, name: &str) -> Result<&T, TestError> {
        self.resources.get_as(name)
    }
}

// ============================================================================
// SUITE
// ============================================================================

/// Declares one module.
pub type Declaration = dyn Fn(&mut ModuleScope<'_>) -> Result<(), TestError>;

/// Prepares the engine before a run.
pub type Entrypoint = dyn Fn(&mut Engine) -> Result<(), TestError>;

/// Registration-based module source.
///
/// ```rust
/// use microtest::{check, Callable, Suite};
///
/// let suite = Suite::new("example").module("tests/test_math.rs", |scope| {
///     scope.test(Callable::new("adds", |_| {
///         let sum = 1 + 1;
///         check!(sum == 2 => [sum]);
///         Ok(())
///     }))?;
///     Ok(())
/// });
/// assert_eq!(suite.modules().len(), 1);
/// ```
pub struct Suite {
    name: String,
    modules: Vec<(String, Box<Declaration>)>,
    entrypoints: Vec<(String, Box<Entrypoint>)>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
            entrypoints: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a module. Registering a path twice replaces the earlier declaration.
    pub fn module<F>(mut self, path: impl Into<String>, declare: F) -> Self
    where
        F: Fn(&mut ModuleScope<'_>) -> Result<(), TestError> + 'static,
    {
        let path = path.into();
        self.modules.retain(|(existing, _)| *existing != path);
        self.modules.push((path, Box::new(declare)));
        self
    }

    /// Adds a named configuration entrypoint.
    pub fn entrypoint<F>(mut self, name: impl Into<String>, configure: F) -> Self
    where
        F: Fn(&mut Engine) -> Result<(), TestError> + 'static,
    {
        self.entrypoints.push((name.into(), Box::new(configure)));
        self
    }

    pub fn modules(&self) -> Vec<&str> {
        self.modules.iter().map(|(path, _)| path.as_str()).collect()
    }

    pub fn get_entrypoint(&self, name: &str) -> Option<&Entrypoint> {
        self.entrypoints
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, entrypoint)| entrypoint.as_ref())
    }

    pub fn entrypoint_names(&self) -> Vec<&str> {
        self.entrypoints.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl ModuleSource for Suite {
    fn module_paths(&self) -> Vec<String> {
        self.modules.iter().map(|(path, _)| path.clone()).collect()
    }

    fn load(&self, path: &str, scope: &mut ModuleScope<'_>) -> Result<(), TestError> {
        let (_, declare) = self
            .modules
            .iter()
            .find(|(candidate, _)| candidate == path)
            .ok_or_else(|| TestError::UnknownModule {
                path: path.to_string(),
            })?;
        declare(scope)
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("modules", &self.modules())
            .field("entrypoints", &self.entrypoint_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(suite: &Suite, path: &str, utilities: &ResourceGraph) -> (Module, ResourceGraph, Result<(), TestError>) {
        let mut module = Module::new(path);
        let mut resources = ResourceGraph::new();
        let result = {
            let mut scope = ModuleScope::new(&mut module, &mut resources, utilities);
            suite.load(path, &mut scope)
        };
        (module, resources, result)
    }

    #[test]
    fn test_declarations_populate_module_and_resources() {
        let suite = Suite::new("s").module("tests/test_db.rs", |scope| {
            let prefix = scope.utility::<String>("prefix")?.clone();
            scope.add_resource("base", 40u32);
            scope.add_resource_with("answer", &["base"], |args| Ok(*args.get::<u32>("base")? + 2))?;
            scope.setup(Callable::new("setup", |_| Ok(())))?;
            scope
                .test(Callable::new(format!("{prefix}_one"), |_| Ok(())))?
                .group("smoke");
            Ok(())
        });

        let mut utilities = ResourceGraph::new();
        utilities.add("prefix", String::from("db"));
        let (module, resources, result) = load(&suite, "tests/test_db.rs", &utilities);
        result.unwrap();
        assert_eq!(module.tests()[0].name(), "test_db::db_one");
        assert_eq!(module.tests()[0].group_name(), Some("smoke"));
        assert!(module.fixture().is_some());
        assert_eq!(*resources.get_as::<u32>("answer").unwrap(), 42);
    }

    #[test]
    fn test_unknown_module_and_entrypoints() {
        let suite = Suite::new("s").entrypoint("main", |_| Ok(()));
        let (_, _, result) = load(&suite, "nope.rs", &ResourceGraph::new());
        assert!(matches!(result, Err(TestError::UnknownModule { .. })));
        assert!(suite.get_entrypoint("main").is_some());
        assert!(suite.get_entrypoint("other").is_none());
        assert_eq!(suite.entrypoint_names(), vec!["main"]);
    }

    #[test]
    fn test_duplicate_setup_is_a_declaration_error() {
        let suite = Suite::new("s").module("m.rs", |scope| {
            scope.setup(Callable::new("a", |_| Ok(())))?;
            scope.setup(Callable::new("b", |_| Ok(())))?;
            Ok(())
        });
        let (_, _, result) = load(&suite, "m.rs", &ResourceGraph::new());
        assert_eq!(
            result.unwrap_err().to_string(),
            "Setup function is already set for this module"
        );
    }
}
