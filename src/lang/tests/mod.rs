//! Scenario tests for the resolver and the evaluator. Every test builds its
//! definitions through the builder, compiles them into a `Site` and asserts
//! on the outcome of construction requests.

mod utils;
mod eval_operators;
mod eval_constructs;
mod eval_concurrent;

pub(crate) use utils::Tester; // the testing harness
pub(crate) use crate::lang::ast::*;
pub(crate) use crate::lang::builder::*;
pub(crate) use crate::lang::eval::*;
