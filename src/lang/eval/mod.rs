/// eval
///
/// Evaluator of resolved constructions. Evaluation is a recursive walk over
/// the nodes of a definition body, carried out against a `Context`: the
/// stack of frames of the instantiations that are currently running.
///
/// Every definition is generated according to its durability. Static values
/// are computed once for the whole site and live in the `StaticCache`,
/// contextual values live in the frame of the instantiation that asked for
/// them, and dynamic values are never stored.
///
/// Collections are built shallowly. Their elements stay unevaluated until
/// they are accessed, and are resolved for good when the collection leaves
/// the frame that built it.
///
/// Anything that stops normal evaluation travels outwards as an `Unwind`:
/// either an `EvalError` or a `Redirection` that a handler may claim.

pub mod collection;
pub mod context;
pub mod error;
pub mod operators;
pub mod value;

pub(crate) mod cache;
pub(crate) mod engine;
mod concurrent;

pub use collection::{CollectionFlavor, CollectionInstance, Element, Index};
pub use context::Context;
pub use error::{EvalError, EvalErrorKind, EvalFrame, EvalResult, Redirection, Unwind};
pub use value::{ArgKey, Value, ValueKey};
