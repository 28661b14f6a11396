//! Test objects, modules and the filter sets that select them.
//!
//! Modules run in the order they are handed to the engine, tests in declaration order. Filtering
//! uses one rule for modules and groups: a non-empty include list wins outright, otherwise the
//! exclude list drops matches.

use std::path::Path;

use crate::error::{TestError, TestResult};
use crate::fixture::Fixture;
use crate::resources::{Callable, Signature};

// ============================================================================
// TEST OBJECT
// ============================================================================

/// A declared test and its last outcome.
#[derive(Debug)]
pub struct TestObject {
    name: String,
    module_path: String,
    group: Option<String>,
    callable: Callable,
    executed: bool,
    result: Option<TestResult>,
    error: Option<TestError>,
}

impl TestObject {
    pub fn new(module_path: impl Into<String>, callable: Callable) -> Self {
        let module_path = module_path.into();
        let name = format!("{}::{}", module_stem(&module_path), callable.name());
        Self {
            name,
            module_path,
            group: None,
            callable,
            executed: false,
            result: None,
            error: None,
        }
    }

    /// Tags the test with a group.
    pub fn group(&mut self, group: impl Into<String>) -> &mut Self {
        self.group = Some(group.into());
        self
    }

    /// Qualified name, `module::test`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn executed(&self) -> bool {
        self.executed
    }

    pub fn result(&self) -> Option<TestResult> {
        self.result
    }

    pub fn error(&self) -> Option<&TestError> {
        self.error.as_ref()
    }

    pub(crate) fn record(&mut self, result: TestResult, error: Option<TestError>) {
        self.executed = true;
        self.result = Some(result);
        self.error = error;
    }
}

impl Signature for TestObject {
    fn parameters(&self) -> &[String] {
        self.callable.parameters()
    }
}

fn module_stem(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(path)
}

// ============================================================================
// MODULE
// ============================================================================

/// One loaded unit of tests.
#[derive(Debug)]
pub struct Module {
    path: String,
    tests: Vec<TestObject>,
    fixture: Option<Fixture>,
}

impl Module {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tests: Vec::new(),
            fixture: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tests(&self) -> &[TestObject] {
        &self.tests
    }

    pub(crate) fn tests_mut(&mut self) -> &mut [TestObject] {
        &mut self.tests
    }

    /// Declares a test; test names are unique within a module.
    pub fn add_test(&mut self, callable: Callable) -> Result<&mut TestObject, TestError> {
        if self.tests.iter().any(|t| t.callable.name() == callable.name()) {
            return Err(TestError::DuplicateTest {
                name: callable.name().to_string(),
            });
        }
        let index = self.tests.len();
        self.tests.push(TestObject::new(self.path.clone(), callable));
        Ok(&mut self.tests[index])
    }

    pub fn fixture(&self) -> Option<&Fixture> {
        self.fixture.as_ref()
    }

    /// The module's fixture, created on first use.
    pub fn fixture_mut(&mut self) -> &mut Fixture {
        self.fixture.get_or_insert_with(Fixture::new)
    }

    pub(crate) fn take_fixture(&mut self) -> Option<Fixture> {
        self.fixture.take()
    }

    pub(crate) fn restore_fixture(&mut self, fixture: Option<Fixture>) {
        self.fixture = fixture;
    }

    /// Indices of the tests whose group passes `filters`, in declaration order.
    pub fn select(&self, filters: &Filters) -> Vec<usize> {
        self.tests
            .iter()
            .enumerate()
            .filter(|(_, test)| filters.group_selected(test.group_name()))
            .map(|(index, _)| index)
            .collect()
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// Module and group selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub included_modules: Vec<String>,
    pub excluded_modules: Vec<String>,
    pub included_groups: Vec<String>,
    pub excluded_groups: Vec<String>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_modules<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, paths: I) {
        self.included_modules.extend(paths.into_iter().map(Into::into));
    }

    pub fn exclude_modules<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, paths: I) {
        self.excluded_modules.extend(paths.into_iter().map(Into::into));
    }

    pub fn include_groups<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, groups: I) {
        self.included_groups.extend(groups.into_iter().map(Into::into));
    }

    pub fn exclude_groups<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, groups: I) {
        self.excluded_groups.extend(groups.into_iter().map(Into::into));
    }

    /// Whether the module at `path` runs.
    pub fn module_selected(&self, path: &str) -> bool {
        if !self.included_modules.is_empty() {
            return self
                .included_modules
                .iter()
                .any(|restriction| restriction_matches(restriction, path));
        }
        !self
            .excluded_modules
            .iter()
            .any(|restriction| restriction_matches(restriction, path))
    }

    /// Whether a test tagged `group` runs. Untagged tests never match an include list.
    pub fn group_selected(&self, group: Option<&str>) -> bool {
        if !self.included_groups.is_empty() {
            return group.is_some_and(|g| self.included_groups.iter().any(|i| i == g));
        }
        match group {
            Some(g) => !self.excluded_groups.iter().any(|e| e == g),
            None => true,
        }
    }

    /// Keeps the selected paths, preserving order.
    pub fn filter_modules<'a>(&self, paths: &'a [String]) -> Vec<&'a str> {
        paths
            .iter()
            .map(String::as_str)
            .filter(|path| self.module_selected(path))
            .collect()
    }
}

/// An absolute restriction names one path exactly; anything else matches as a substring.
fn restriction_matches(restriction: &str, path: &str) -> bool {
    if Path::new(restriction).is_absolute() {
        Path::new(restriction) == Path::new(path)
    } else {
        path.contains(restriction)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Filters plus the permanent record of every module executed in this run.
#[derive(Debug, Default)]
pub struct Registry {
    filters: Filters,
    modules: Vec<Module>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }

    pub(crate) fn record(&mut self, module: Module) {
        self.modules.push(module);
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestObject> {
        self.modules.iter().flat_map(|module| module.tests.iter())
    }

    /// Looks a test up by qualified name.
    pub fn test(&self, name: &str) -> Option<&TestObject> {
        self.tests().find(|test| test.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Callable {
        Callable::new(name, |_| Ok(()))
    }

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_included_modules_win_over_excluded() {
        let mut filters = Filters::new();
        filters.include_modules(["math"]);
        filters.exclude_modules(["math"]);
        let all = paths(&["tests/test_math.rs", "tests/test_io.rs"]);
        assert_eq!(filters.filter_modules(&all), vec!["tests/test_math.rs"]);
    }

    #[test]
    fn test_excluded_modules_by_substring() {
        let mut filters = Filters::new();
        filters.exclude_modules(["slow"]);
        let all = paths(&["a/test_fast.rs", "a/test_slow.rs", "b/tests.rs"]);
        assert_eq!(filters.filter_modules(&all), vec!["a/test_fast.rs", "b/tests.rs"]);
    }

    #[test]
    fn test_absolute_restriction_is_exact() {
        let mut filters = Filters::new();
        filters.include_modules(["/suite/tests.rs"]);
        assert!(filters.module_selected("/suite/tests.rs"));
        assert!(!filters.module_selected("/suite/tests.rs.bak"));
        assert!(!filters.module_selected("/other/suite/tests.rs"));
    }

    #[test]
    fn test_group_filtering() {
        let mut filters = Filters::new();
        assert!(filters.group_selected(None));
        filters.exclude_groups(["slow"]);
        assert!(!filters.group_selected(Some("slow")));
        assert!(filters.group_selected(Some("fast")));
        assert!(filters.group_selected(None));

        filters.include_groups(["slow"]);
        assert!(filters.group_selected(Some("slow")));
        assert!(!filters.group_selected(Some("fast")));
        assert!(!filters.group_selected(None));
    }

    #[test]
    fn test_module_select_keeps_declaration_order() {
        let mut module = Module::new("tests/test_groups.rs");
        module.add_test(noop("a")).unwrap().group("slow");
        module.add_test(noop("b")).unwrap();
        module.add_test(noop("c")).unwrap().group("fast");
        let mut filters = Filters::new();
        filters.exclude_groups(["slow"]);
        assert_eq!(module.select(&filters), vec![1, 2]);
        assert_eq!(module.tests()[2].name(), "test_groups::c");
    }

    #[test]
    fn test_duplicate_test_names_are_rejected() {
        let mut module = Module::new("m.rs");
        module.add_test(noop("same")).unwrap();
        let err = module.add_test(noop("same")).unwrap_err();
        assert!(matches!(err, TestError::DuplicateTest { name } if name == "same"));
    }

    #[test]
    fn test_registry_lookup_by_qualified_name() {
        let mut module = Module::new("tests/test_lookup.rs");
        module.add_test(noop("found")).unwrap();
        let mut registry = Registry::new();
        registry.record(module);
        let test = registry.test("test_lookup::found").unwrap();
        assert_eq!(test.module_path(), "tests/test_lookup.rs");
        assert!(!test.executed());
        assert!(registry.test("test_lookup::missing").is_none());
    }
}
