use crate::lang::builder::*;
use crate::lang::eval::*;
use crate::runtime::{DummyLogger, Outcome, Site, SiteConfig};

//------------------------------------------------------------------------------
// Interface for building and compiling
//------------------------------------------------------------------------------

pub(crate) struct Tester {
    test_name: String,
    roots: Vec<DefinitionSpec>,
    config: SiteConfig,
}

impl Tester {
    /// Constructs a new tester, allows adding multiple root definitions before
    /// compiling
    pub(crate) fn new<S: ToString>(test_name: S) -> Self {
        Self {
            test_name: test_name.to_string(),
            roots: Vec::new(),
            config: SiteConfig::default(),
        }
    }

    /// Utility for quick tests that use a single root definition and expect
    /// the compilation to succeed.
    pub(crate) fn new_single_expect_ok<T: ToString>(test_name: T, root: DefinitionSpec) -> SiteOkTester {
        Self::new(test_name).with_definition(root).compile().expect_ok()
    }

    pub(crate) fn with_definition(mut self, root: DefinitionSpec) -> Self {
        self.roots.push(root);
        self
    }

    pub(crate) fn with_config(mut self, config: SiteConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn compile(self) -> SiteTesterResult {
        let mut builder = HeapBuilder::new();
        for root in self.roots {
            builder.add_root(root);
        }

        match Site::new(builder.finish(), self.config, Box::new(DummyLogger)) {
            Ok(site) => SiteTesterResult::Ok(SiteOkTester { test_name: self.test_name, site }),
            Err(error) => SiteTesterResult::Err(SiteErrTester { test_name: self.test_name, error }),
        }
    }
}

pub(crate) enum SiteTesterResult {
    Ok(SiteOkTester),
    Err(SiteErrTester),
}

impl SiteTesterResult {
    pub(crate) fn expect_ok(self) -> SiteOkTester {
        match self {
            SiteTesterResult::Ok(v) => v,
            SiteTesterResult::Err(err) => {
                println!("DEBUG: Full error:\n{}", &err.error);
                panic!("[{}] Expected compilation to succeed, but it failed with {}", err.test_name, err.error.kind());
            },
        }
    }

    pub(crate) fn expect_err(self) -> SiteErrTester {
        match self {
            SiteTesterResult::Ok(ok) => {
                panic!("[{}] Expected compilation to fail, but it succeeded", ok.test_name);
            },
            SiteTesterResult::Err(err) => err,
        }
    }
}

//------------------------------------------------------------------------------
// Interface for successful compilation
//------------------------------------------------------------------------------

pub(crate) struct SiteOkTester {
    test_name: String,
    site: Site,
}

impl SiteOkTester {
    pub(crate) fn site(&self) -> &Site {
        &self.site
    }

    pub(crate) fn site_mut(&mut self) -> &mut Site {
        &mut self.site
    }

    /// Asserts that every name and type in the site was bound.
    pub(crate) fn expect_resolved(self) -> Self {
        let summary = self.site.resolve_summary();
        assert!(
            summary.is_complete(),
            "[{}] Expected all names to resolve, but found {:?}",
            self.test_name, summary.unresolved
        );
        self
    }

    pub(crate) fn expect_unresolved(self, name: &str) -> Self {
        let found = self.site.resolve_summary().unresolved.iter().any(|u| u.name == name);
        assert!(found, "[{}] Expected '{}' to remain unresolved", self.test_name, name);
        self
    }

    pub(crate) fn for_construct<F: FnOnce(ConstructTester)>(self, name: &str, args: Vec<Value>, f: F) -> Self {
        let outcome = self.site.construct(name, args);
        f(ConstructTester { test_name: &self.test_name, name: name.to_string(), outcome });
        self
    }

    pub(crate) fn for_construct_with<F: FnOnce(ConstructTester)>(
        self, ctx: &mut Context, name: &str, args: Vec<Value>, f: F,
    ) -> Self {
        let outcome = self.site.construct_with(ctx, name, args);
        f(ConstructTester { test_name: &self.test_name, name: name.to_string(), outcome });
        self
    }
}

//------------------------------------------------------------------------------
// Interface for failed compilation
//------------------------------------------------------------------------------

pub(crate) struct SiteErrTester {
    test_name: String,
    error: EvalError,
}

impl SiteErrTester {
    pub(crate) fn assert_kind(self, kind: EvalErrorKind) -> Self {
        assert_eq!(
            self.error.kind(), kind,
            "[{}] Expected error kind {}, got {}", self.test_name, kind, self.error
        );
        self
    }
}

//------------------------------------------------------------------------------
// Construction results
//------------------------------------------------------------------------------

pub(crate) struct ConstructTester<'a> {
    test_name: &'a str,
    name: String,
    outcome: Result<Outcome<Value>, EvalError>,
}

impl<'a> ConstructTester<'a> {
    /// Returns the value of a construction that is expected to complete.
    pub(crate) fn value(&self) -> Value {
        match &self.outcome {
            Ok(Outcome::Complete(value)) => value.clone(),
            Ok(Outcome::Redirected(redirection)) => panic!(
                "[{}] Expected '{}' to complete, but it ended in {}", self.test_name, self.name, redirection
            ),
            Err(error) => panic!(
                "[{}] Expected '{}' to complete, but it failed with {}", self.test_name, self.name, error
            ),
        }
    }

    pub(crate) fn assert_value(self, expected: Value) -> Self {
        let value = self.value();
        assert_eq!(
            value, expected,
            "[{}] Unexpected value of '{}'", self.test_name, self.name
        );
        assert_eq!(value.kind(), expected.kind(), "[{}] Unexpected kind of '{}'", self.test_name, self.name);
        self
    }

    pub(crate) fn assert_text(self, expected: &str) -> Self {
        let text = self.value().to_string();
        assert_eq!(text, expected, "[{}] Unexpected text of '{}'", self.test_name, self.name);
        self
    }

    pub(crate) fn assert_values(self, expected: Vec<Value>) -> Self {
        let values = match self.value() {
            Value::Collection(collection) => collection.values().expect("resolved elements"),
            other => panic!("[{}] Expected a collection, got {:?}", self.test_name, other),
        };
        assert_eq!(values, expected, "[{}] Unexpected elements of '{}'", self.test_name, self.name);
        self
    }

    pub(crate) fn assert_error(self, kind: EvalErrorKind) -> Self {
        match &self.outcome {
            Err(error) => assert_eq!(
                error.kind(), kind,
                "[{}] Expected '{}' to fail with {}, got {}", self.test_name, self.name, kind, error
            ),
            Ok(outcome) => panic!(
                "[{}] Expected '{}' to fail with {}, got {:?}", self.test_name, self.name, kind, outcome
            ),
        }
        self
    }

    pub(crate) fn assert_redirection(self, expected: Redirection) -> Self {
        match &self.outcome {
            Ok(Outcome::Redirected(redirection)) => assert_eq!(
                redirection, &expected,
                "[{}] Unexpected redirection from '{}'", self.test_name, self.name
            ),
            other => panic!(
                "[{}] Expected '{}' to end in {}, got {:?}", self.test_name, self.name, expected, other
            ),
        }
        self
    }

    pub(crate) fn error(&self) -> &EvalError {
        match &self.outcome {
            Err(error) => error,
            Ok(outcome) => panic!("[{}] Expected an error, got {:?}", self.test_name, outcome),
        }
    }
}
