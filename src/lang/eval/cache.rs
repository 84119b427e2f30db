use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use super::error::{EvalError, EvalErrorKind, Unwind};
use super::value::Value;
use crate::lang::ast::{DefinitionId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StaticKey {
    Definition(DefinitionId),
    /// Anonymous static construction
    Node(NodeId),
}

/// Who is generating what, and who waits for whom. A thread waits either for
/// a key claimed by another thread, or (while evaluating a concurrent block)
/// for the workers it spawned.
#[derive(Debug, Default)]
struct State {
    values: HashMap<StaticKey, Value>,
    claims: HashMap<StaticKey, ThreadId>,
    waiting: HashMap<ThreadId, StaticKey>,
    workers: HashMap<ThreadId, Vec<ThreadId>>,
}

impl State {
    /// True if `from` transitively waits for `target`.
    fn reaches(&self, from: ThreadId, target: ThreadId) -> bool {
        let mut pending = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = pending.pop() {
            if current == target {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(owner) = self.waiting.get(&current).and_then(|key| self.claims.get(key)) {
                pending.push(*owner);
            }
            if let Some(workers) = self.workers.get(&current) {
                pending.extend(workers.iter().copied());
            }
        }
        false
    }
}

/// Process-wide storage of static values. The first request for a key claims
/// it and computes the value, concurrent requests for the same key wait for
/// that computation and reuse its result. A request that would wait for a
/// computation which itself (transitively) waits for the requester fails
/// instead.
#[derive(Debug, Default)]
pub(crate) struct StaticCache {
    state: Mutex<State>,
    changed: Condvar,
}

/// Releases a claim when the computation ends, also when it panics.
struct Claim<'a> {
    cache: &'a StaticCache,
    key: StaticKey,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        recover(self.cache.state.lock()).claims.remove(&self.key);
        self.cache.changed.notify_all();
    }
}

/// Marks the current thread as a worker the `parent` thread is joining.
pub(crate) struct WorkerGuard<'a> {
    cache: &'a StaticCache,
    parent: ThreadId,
    worker: ThreadId,
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        let mut state = recover(self.cache.state.lock());
        let now_empty = match state.workers.get_mut(&self.parent) {
            Some(workers) => {
                workers.retain(|&w| w != self.worker);
                workers.is_empty()
            },
            None => false,
        };
        if now_empty {
            state.workers.remove(&self.parent);
        }
    }
}

impl StaticCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the stored value of `key`, computing it with `compute` if
    /// nobody did so yet. Failed computations leave the key empty so a later
    /// request tries again.
    pub(crate) fn get_or_compute<F>(&self, key: StaticKey, compute: F) -> Result<Value, Unwind>
    where
        F: FnOnce() -> Result<Value, Unwind>,
    {
        let me = thread::current().id();
        let mut state = recover(self.state.lock());
        loop {
            if let Some(value) = state.values.get(&key) {
                return Ok(value.clone());
            }
            match state.claims.get(&key).copied() {
                None => {
                    state.claims.insert(key, me);
                    break;
                },
                Some(owner) => {
                    if state.reaches(owner, me) {
                        return Err(EvalError::new(
                            EvalErrorKind::RecursionLimit,
                            "static value is generated by an evaluation that waits for this one",
                        ).into());
                    }
                    state.waiting.insert(me, key);
                    state = recover(self.changed.wait(state));
                    state.waiting.remove(&me);
                },
            }
        }
        drop(state);

        let claim = Claim { cache: self, key };
        let result = compute();
        if let Ok(value) = &result {
            recover(self.state.lock()).values.insert(key, value.clone());
        }
        drop(claim);
        result
    }

    /// Registers the current thread as a worker of `parent` until the guard
    /// is dropped.
    pub(crate) fn enter_worker(&self, parent: ThreadId) -> WorkerGuard<'_> {
        let worker = thread::current().id();
        recover(self.state.lock()).workers.entry(parent).or_insert_with(Vec::new).push(worker);
        WorkerGuard { cache: self, parent, worker }
    }

    /// Drops every stored value. Used when the definitions change.
    pub(crate) fn clear(&self) {
        recover(self.state.lock()).values.clear();
    }

    pub(crate) fn len(&self) -> usize {
        recover(self.state.lock()).values.len()
    }
}

fn recover<'a, T>(
    result: Result<MutexGuard<'a, T>, std::sync::PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|poisoned| poisoned.into_inner())
}
