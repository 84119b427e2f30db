///////////////////// PRELUDE /////////////////////

pub(crate) use crate::lang::ast::{DefinitionId, Heap};
pub(crate) use crate::lang::eval::{
    Context, EvalError, EvalErrorKind, Redirection, Unwind, Value,
};
