pub mod config;
mod logging;


use std::fmt::Debug;
use std::sync::Mutex;

use indexmap::IndexMap;

use crate::common::*;
use crate::lang::builder::{alloc_definition, DefinitionSpec};
use crate::lang::eval::cache::StaticCache;
use crate::lang::eval::engine::Engine;
use crate::lang::resolver::{resolve, ResolveSummary};
use crate::lang::table::{Added, DefinitionTable};

pub use config::{SiteConfig, SiteId};
pub use logging::{DummyLogger, FileLogger, VecLogger};

pub trait Logger: Debug + Send {
    fn line_writer(&mut self) -> Option<&mut dyn std::io::Write>;
}

/// Terminal result of a request: either the constructed value, or the
/// redirection nobody claimed.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Complete(T),
    Redirected(Redirection),
}

impl<T> Outcome<T> {
    pub fn complete(self) -> Option<T> {
        match self {
            Outcome::Complete(value) => Some(value),
            Outcome::Redirected(_) => None,
        }
    }

    pub fn redirection(&self) -> Option<&Redirection> {
        match self {
            Outcome::Complete(_) => None,
            Outcome::Redirected(redirection) => Some(redirection),
        }
    }

    fn try_map<U, F>(self, f: F) -> Result<Outcome<U>, EvalError>
    where
        F: FnOnce(T) -> Result<U, EvalError>,
    {
        Ok(match self {
            Outcome::Complete(value) => Outcome::Complete(f(value)?),
            Outcome::Redirected(redirection) => Outcome::Redirected(redirection),
        })
    }
}

/// A compiled domain ready to serve construction requests. Requests only
/// need a shared reference, so one site can be used from several threads at
/// once. Adding definitions needs exclusive access.
#[derive(Debug)]
pub struct Site {
    heap: Heap,
    table: DefinitionTable,
    statics: StaticCache,
    config: SiteConfig,
    summary: ResolveSummary,
    logger: Mutex<Box<dyn Logger>>,
}

impl Site {
    /// Indexes and resolves a heap handed over by the parser. Fails only if
    /// two definitions collide, unresolved names are logged and left bound to
    /// the unknown sentinel.
    pub fn new(mut heap: Heap, config: SiteConfig, logger: Box<dyn Logger>) -> Result<Site, EvalError> {
        let table = DefinitionTable::build(&heap)?;
        let summary = resolve(&mut heap, &table);
        let site = Site { heap, table, statics: StaticCache::new(), config, summary, logger: Mutex::new(logger) };

        site.log(format_args!(
            "Created site {} with {} definition(s) and config {:?}",
            site.config.site_id, site.table.len(), &site.config,
        ));
        site.log_summary();
        Ok(site)
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn table(&self) -> &DefinitionTable {
        &self.table
    }

    pub fn resolve_summary(&self) -> &ResolveSummary {
        &self.summary
    }

    /// Looks up a definition by its qualified name.
    pub fn lookup(&self, full_name: &str) -> Option<DefinitionId> {
        self.table.lookup(full_name)
    }

    /// Adds a definition below the definition called `owner` (at the top
    /// level for `None`). With `replace` a definition of the same name and
    /// signature is swapped out, without it such a collision is an error.
    /// The new heap, table and bindings are prepared aside and only take
    /// effect if all of them succeed, a failed addition leaves the site as
    /// it was. Static values are discarded on success.
    pub fn add_definition(
        &mut self, owner: Option<&str>, spec: DefinitionSpec, replace: bool,
    ) -> Result<DefinitionId, EvalError> {
        let owner = match owner {
            Some(name) => self.lookup(name).ok_or_else(|| EvalError::new(
                EvalErrorKind::UnknownDefinition,
                format!("owner '{}' is not defined", name),
            ))?,
            None => DefinitionId::new_invalid(),
        };

        let mut heap = self.heap.clone();
        let def = alloc_definition(&mut heap, owner, spec);
        let full_name = heap[def].full_name.clone();
        let (added, table) = match self.prepare_table(&mut heap, owner, def, replace) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.log(format_args!("Rejected definition '{}': {}", full_name, err));
                return Err(err);
            },
        };
        let summary = resolve(&mut heap, &table);

        self.heap = heap;
        self.table = table;
        self.summary = summary;
        let num_statics = self.statics.len();
        self.statics.clear();
        self.log(format_args!("Discarded {} static value(s)", num_statics));

        match added {
            Added::New => self.log(format_args!("Added definition '{}'", full_name)),
            Added::Replaced(_) => self.log(format_args!("Replaced definition '{}'", full_name)),
        }
        self.log_summary();
        Ok(def)
    }

    /// Links `def` into its siblings of `heap` and indexes the result.
    fn prepare_table(
        &self, heap: &mut Heap, owner: DefinitionId, def: DefinitionId, replace: bool,
    ) -> Result<(Added, DefinitionTable), EvalError> {
        let added = self.table.clone().add_definition(heap, def, replace)?;
        let siblings = if owner.is_invalid() { &mut heap.roots } else { &mut heap[owner].children };
        match added {
            Added::New => siblings.push(def),
            Added::Replaced(old) => match siblings.iter().position(|&id| id == old) {
                Some(position) => siblings[position] = def,
                None => siblings.push(def),
            },
        }

        // Children of a replaced definition go away with it, the children of
        // the new one may collide among themselves
        let table = DefinitionTable::build(heap)?;
        Ok((added, table))
    }

    /// Constructs the definition called `name` in a fresh request context.
    pub fn construct(&self, name: &str, args: Vec<Value>) -> Result<Outcome<Value>, EvalError> {
        let mut ctx = Context::new();
        self.construct_with(&mut ctx, name, args)
    }

    /// Like `construct`, but evaluates against a context owned by the caller,
    /// which may have been extended with `Context::put` beforehand.
    pub fn construct_with(
        &self, ctx: &mut Context, name: &str, args: Vec<Value>,
    ) -> Result<Outcome<Value>, EvalError> {
        let def = self
            .lookup(name)
            .map(|def| {
                self.table.select_overload(&self.heap, def, &args).map(|(selected, _)| selected).unwrap_or(def)
            })
            .ok_or_else(|| EvalError::new(
                EvalErrorKind::UnknownDefinition,
                format!("'{}' is not defined", name),
            ));
        let def = match def {
            Ok(def) => def,
            Err(err) => {
                self.log(format_args!("Request for '{}' failed: {}", name, err.kind()));
                return Err(err);
            },
        };

        self.log(format_args!("Request for '{}' with {} argument(s)", name, args.len()));
        let engine = Engine::new(&self.heap, &self.table, &self.statics, &self.config);
        match engine.construct(ctx, def, args) {
            Ok(value) => {
                self.log(format_args!("Request for '{}' completed with a {} value", name, value.kind()));
                Ok(Outcome::Complete(value))
            },
            Err(Unwind::Signal(redirection)) => {
                self.log(format_args!("Request for '{}' ended in {}", name, redirection));
                Ok(Outcome::Redirected(redirection))
            },
            Err(Unwind::Error(err)) => {
                self.log(format_args!("Request for '{}' failed: {}", name, err.kind()));
                Err(err)
            },
        }
    }

    pub fn construct_text(&self, name: &str, args: Vec<Value>) -> Result<Outcome<String>, EvalError> {
        self.construct(name, args)?.try_map(|value| Ok(value.to_string()))
    }

    /// Constructs `name` and returns the elements of the resulting array. An
    /// absent value is an empty array.
    pub fn construct_array(&self, name: &str, args: Vec<Value>) -> Result<Outcome<Vec<Value>>, EvalError> {
        self.construct(name, args)?.try_map(|value| match value {
            Value::Void => Ok(Vec::new()),
            Value::Collection(collection) if !collection.is_table() => collection.values(),
            Value::Collection(_) => Err(EvalError::new(
                EvalErrorKind::ArrayReference,
                format!("'{}' constructs a table, not an array", name),
            )),
            other => Err(EvalError::usage(format!(
                "'{}' constructs a {} value, not an array", name, other.kind()
            ))),
        })
    }

    /// Constructs `name` and returns the entries of the resulting table in
    /// insertion order. An absent value is an empty table.
    pub fn construct_table(
        &self, name: &str, args: Vec<Value>,
    ) -> Result<Outcome<IndexMap<String, Value>>, EvalError> {
        self.construct(name, args)?.try_map(|value| match value {
            Value::Void => Ok(IndexMap::new()),
            Value::Collection(collection) if collection.is_table() => {
                let keys = collection.entries().into_iter().map(|(key, _)| key.unwrap_or_default());
                Ok(keys.zip(collection.values()?).collect())
            },
            Value::Collection(_) => Err(EvalError::new(
                EvalErrorKind::TableReference,
                format!("'{}' constructs an array, not a table", name),
            )),
            other => Err(EvalError::usage(format!(
                "'{}' constructs a {} value, not a table", name, other.kind()
            ))),
        })
    }

    fn log(&self, args: std::fmt::Arguments) {
        let mut logger = self.logger.lock().unwrap_or_else(|p| p.into_inner());
        log!(logger, "{}", args);
    }

    fn log_summary(&self) {
        self.log(format_args!(
            "Resolved {} name(s) and type(s), {} unresolved",
            self.summary.num_bound, self.summary.unresolved.len(),
        ));
        for unresolved in &self.summary.unresolved {
            self.log(format_args!(
                "Unresolved '{}' in '{}' at {}",
                unresolved.name, unresolved.owner, unresolved.position,
            ));
        }
    }
}
