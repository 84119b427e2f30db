use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::context::Context;
use super::engine::Engine;
use super::error::{EvalError, EvalErrorKind, Unwind};
use crate::lang::ast::NodeId;

type Slot = Mutex<Option<Result<String, Unwind>>>;

/// Renders the constructions of a concurrent block on a bounded pool of
/// scoped worker threads. Every sibling gets its own context on top of the
/// (then read-only) context of the block. Results are assembled in source
/// order. When a sibling fails or raises a redirection no further siblings
/// are started, and the earliest unwind in source order is returned.
pub(crate) fn eval_concurrent(
    engine: &Engine, ctx: &Context, children: &[NodeId],
) -> Result<Vec<String>, Unwind> {
    let num_workers = engine.config.max_workers.max(1).min(children.len());
    let next = AtomicUsize::new(0);
    let cancelled = AtomicBool::new(false);
    let slots: Vec<Slot> = children.iter().map(|_| Mutex::new(None)).collect();
    let parent = std::thread::current().id();

    let joined = crossbeam_utils::thread::scope(|s| {
        for _ in 0..num_workers {
            s.spawn(|_| {
                // The block is blocked on its workers until they are done
                let _working = engine.statics.enter_worker(parent);
                loop {
                    if cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::AcqRel);
                    if index >= children.len() {
                        break;
                    }

                    let mut own = Context::nested(ctx);
                    let result = engine.render(&mut own, children[index]);
                    if result.is_err() {
                        cancelled.store(true, Ordering::Release);
                    }
                    *slots[index].lock().unwrap_or_else(|p| p.into_inner()) = Some(result);
                }
            });
        }
    });
    if joined.is_err() {
        return Err(EvalError::new(EvalErrorKind::Internal, "a concurrent construction panicked").into());
    }

    // Siblings are claimed in source order, so every slot in front of the
    // first unwind has been filled
    let mut texts = Vec::with_capacity(children.len());
    for slot in slots {
        match slot.into_inner().unwrap_or_else(|p| p.into_inner()) {
            Some(Ok(text)) => texts.push(text),
            Some(Err(unwind)) => return Err(unwind),
            None => {
                return Err(EvalError::new(EvalErrorKind::Internal, "concurrent construction was skipped").into());
            },
        }
    }
    Ok(texts)
}
