#[macro_use]
mod macros;

mod common;
pub mod lang;
pub mod runtime;

pub use lang::ast::Heap;
pub use lang::builder::{DefinitionSpec, HeapBuilder, ParamSpec, Syntax, TypeSpec};
pub use lang::eval::{Context, EvalError, EvalErrorKind, Redirection, Value};
pub use runtime::{DummyLogger, FileLogger, Logger, Outcome, Site, SiteConfig, VecLogger};
