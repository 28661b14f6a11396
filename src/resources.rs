//! Named resources and resource injection.
//!
//! Every test and lifecycle function is a [`Callable`] that declares the names of the resources it
//! needs. Before invocation the resolver looks each declared name up in the [`ResourceGraph`] and
//! hands the callable an [`Args`] view containing exactly those values. Resolving a name that was
//! never registered is a hard error.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::capture::capture;
use crate::error::TestError;

/// A registered resource value.
pub type Resource = Rc<dyn Any>;

/// Body of a test or lifecycle function.
pub type Body = dyn Fn(&Args) -> Result<(), TestError>;

// ============================================================================
// RESOURCE GRAPH
// ============================================================================

/// Mapping from resource name to value.
#[derive(Clone, Default)]
pub struct ResourceGraph {
    values: HashMap<String, Resource>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `name`, replacing any previous value.
    pub fn add<T: Any>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), Rc::new(value));
    }

    pub fn add_shared(&mut self, name: impl Into<String>, value: Resource) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.values.get(name)
    }

    /// Typed lookup.
    pub fn get_as<T: Any>(&self, name: &str) -> Result<&T, TestError> {
        downcast(name, self.values.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ResourceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGraph")
            .field("names", &self.names())
            .finish()
    }
}

fn downcast<'a, T: Any>(name: &str, value: Option<&'a Resource>) -> Result<&'a T, TestError> {
    let value = value.ok_or_else(|| TestError::MissingResource {
        name: name.to_string(),
    })?;
    value
        .downcast_ref::<T>()
        .ok_or_else(|| TestError::ResourceType {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}

// ============================================================================
// CALLABLES
// ============================================================================

/// Anything that declares formal parameter names: plain callables, and objects proxying to one.
pub trait Signature {
    fn parameters(&self) -> &[String];
}

/// A named function with declared resource parameters.
pub struct Callable {
    name: String,
    params: Vec<String>,
    body: Box<Body>,
}

impl Callable {
    /// A callable without parameters.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Args) -> Result<(), TestError> + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            body: Box::new(body),
        }
    }

    /// Declares the resources this callable receives, in order.
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the body behind the panic boundary.
    pub fn invoke(&self, args: &Args) -> Result<(), TestError> {
        capture(|| (self.body)(args))
    }
}

impl Signature for Callable {
    fn parameters(&self) -> &[String] {
        &self.params
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Resolved arguments of one invocation.
#[derive(Default)]
pub struct Args {
    values: Vec<(String, Resource)>,
}

impl Args {
    pub fn get<T: Any>(&self, name: &str) -> Result<&T, TestError> {
        let value = self
            .values
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value);
        downcast(name, value)
    }

    /// The shared handle of an argument, for values that must outlive the invocation.
    pub fn shared(&self, name: &str) -> Option<Resource> {
        self.values
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| Rc::clone(value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Looks up every declared parameter of `target`.
///
/// Fails with [`TestError::MissingResource`] naming the first parameter that is not registered.
pub fn resolve<S: Signature + ?Sized>(target: &S, graph: &ResourceGraph) -> Result<Args, TestError> {
    let mut values = Vec::with_capacity(target.parameters().len());
    for param in target.parameters() {
        let value = graph
            .get(param)
            .ok_or_else(|| TestError::MissingResource {
                name: param.clone(),
            })?;
        values.push((param.clone(), Rc::clone(value)));
    }
    Ok(Args { values })
}

/// Resolves the callable's resources and invokes it.
pub fn call_with_resources(callable: &Callable, graph: &ResourceGraph) -> Result<(), TestError> {
    let args = resolve(callable, graph)?;
    callable.invoke(&args)
}

/// Builds a resource from a factory whose own parameters are resolved from the graph.
pub fn produce<T, F>(params: &[String], graph: &ResourceGraph, factory: F) -> Result<T, TestError>
where
    F: FnOnce(&Args) -> Result<T, TestError>,
{
    struct Params<'a>(&'a [String]);
    impl Signature for Params<'_> {
        fn parameters(&self) -> &[String] {
            self.0
        }
    }

    let args = resolve(&Params(params), graph)?;
    capture(|| factory(&args))
}
