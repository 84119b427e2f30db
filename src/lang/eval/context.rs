use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::value::{ArgKey, Value};
use crate::lang::ast::{DefinitionId, NodeId, ParamOrigin, ParamRef};

static NEXT_FRAME_KEY: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameOrigin {
    Definition(DefinitionId),
    Loop(NodeId),
    /// Evaluation of an anonymous static construction
    Once(NodeId),
    Request,
}

#[derive(Debug, Clone)]
pub(crate) struct CachedValue {
    pub(crate) args: ArgKey,
    pub(crate) value: Value,
}

/// One instantiation on the scope stack. Holds the resolved arguments of the
/// instantiation, the locals put there by the caller or by keeps, and the
/// contextual cache slots of the definitions instantiated from within it.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) key: u64,
    pub(crate) origin: FrameOrigin,
    pub(crate) signature: usize,
    pub(crate) args: Vec<(String, Value)>,
    pub(crate) arg_key: ArgKey,
    pub(crate) locals: HashMap<String, Value>,
    pub(crate) cache: HashMap<DefinitionId, CachedValue>,
}

impl Frame {
    pub(crate) fn new(origin: FrameOrigin, signature: usize, args: Vec<(String, Value)>) -> Self {
        let arg_key = {
            let values: Vec<Value> = args.iter().map(|(_, v)| v.clone()).collect();
            ArgKey::new(&values)
        };
        Frame {
            key: NEXT_FRAME_KEY.fetch_add(1, Ordering::Relaxed),
            origin,
            signature,
            args,
            arg_key,
            locals: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    fn arg(&self, name: &str) -> Option<&Value> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn matches(&self, origin: ParamOrigin) -> bool {
        match (origin, self.origin) {
            (ParamOrigin::Definition(a), FrameOrigin::Definition(b)) => a == b,
            (ParamOrigin::Loop(a), FrameOrigin::Loop(b)) => a == b,
            _ => false,
        }
    }
}

/// The dynamic scope stack of one evaluation path. A context created for a
/// concurrent sibling starts empty and refers to the context of its block
/// through `container`, which it can only read.
#[derive(Debug)]
pub struct Context<'c> {
    frames: Vec<Frame>,
    container: Option<&'c Context<'c>>,
}

impl Context<'static> {
    /// Creates the context of a top-level request.
    pub fn new() -> Self {
        Context { frames: vec![Frame::new(FrameOrigin::Request, 0, Vec::new())], container: None }
    }
}

impl Default for Context<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'c> Context<'c> {
    /// Creates a context that extends `container` without being able to
    /// modify it.
    pub fn nested(container: &'c Context<'c>) -> Context<'c> {
        Context {
            frames: vec![Frame::new(FrameOrigin::Request, 0, Vec::new())],
            container: Some(container),
        }
    }

    /// Looks up `name` among the locals and arguments of every frame,
    /// innermost first.
    pub fn get(&self, name: &str) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.locals.get(name) {
                return Some(value.clone());
            }
            if let Some(value) = frame.arg(name) {
                return Some(value.clone());
            }
        }
        self.container.and_then(|container| container.get(name))
    }

    /// Looks up `name` among the locals only, skipping arguments. Values put
    /// there by the caller or by keeps shadow definitions of the same name.
    pub(crate) fn local(&self, name: &str) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.locals.get(name) {
                return Some(value.clone());
            }
        }
        self.container.and_then(|container| container.local(name))
    }

    /// Binds `name` in the innermost frame.
    pub fn put<S: Into<String>>(&mut self, name: S, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.locals.insert(name.into(), value);
        }
    }

    pub fn container_context(&self) -> Option<&Context<'c>> {
        self.container
    }

    /// Number of frames on the stack, including those of the containers.
    pub fn depth(&self) -> usize {
        self.frames.len() + self.container.map(|c| c.depth()).unwrap_or(0)
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        if let FrameOrigin::Definition(def) = frame.origin {
            // A different argument signature for the same definition makes the
            // slot below stale
            if let Some(below) = self.frames.last_mut() {
                let stale = match below.cache.get(&def) {
                    Some(cached) => cached.args != frame.arg_key,
                    None => false,
                };
                if stale {
                    below.cache.remove(&def);
                }
            }
        }
        self.frames.push(frame);
    }

    pub(crate) fn pop_frame(&mut self) -> Option<Frame> {
        // The request frame always stays
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Key of the innermost frame of this evaluation path.
    pub(crate) fn frame_key(&self) -> u64 {
        match self.frames.last() {
            Some(frame) => frame.key,
            None => self.container.map(|c| c.frame_key()).unwrap_or(u64::MAX),
        }
    }

    pub(crate) fn lookup_param(&self, param: &ParamRef) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            if frame.matches(param.origin) {
                return frame.arg(&param.name).cloned();
            }
        }
        self.container.and_then(|container| container.lookup_param(param))
    }

    /// True if `name` was passed explicitly to the innermost definition
    /// instantiation (loop frames in between are looked through).
    pub(crate) fn is_explicit_arg(&self, name: &str) -> bool {
        for frame in self.frames.iter().rev() {
            match frame.origin {
                FrameOrigin::Loop(_) => {
                    if frame.arg(name).is_some() {
                        return true;
                    }
                },
                FrameOrigin::Definition(_) => return frame.arg(name).is_some(),
                FrameOrigin::Once(_) | FrameOrigin::Request => {},
            }
        }
        self.container.map(|c| c.is_explicit_arg(name)).unwrap_or(false)
    }

    /// Returns the contextual cache slot of `def` if it was computed for the
    /// same arguments. The nearest slot for `def` decides.
    pub(crate) fn cached(&self, def: DefinitionId, args: &ArgKey) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(cached) = frame.cache.get(&def) {
                return if &cached.args == args { Some(cached.value.clone()) } else { None };
            }
        }
        self.container.and_then(|container| container.cached(def, args))
    }

    /// Fills the contextual cache slot of `def` in the innermost frame and
    /// returns the value held by the slot.
    pub(crate) fn store_cached(&mut self, def: DefinitionId, args: ArgKey, value: Value) -> Value {
        if let Some(frame) = self.frames.last_mut() {
            frame.cache.insert(def, CachedValue { args, value: value.clone() });
        }
        value
    }

    pub(crate) fn has_frame(&self, origin: FrameOrigin) -> bool {
        self.frames.iter().any(|f| f.origin == origin)
            || self.container.map(|c| c.has_frame(origin)).unwrap_or(false)
    }

    /// Definitions currently being instantiated, outermost first.
    pub(crate) fn definition_trace(&self) -> Vec<DefinitionId> {
        let mut trace = self.container.map(|c| c.definition_trace()).unwrap_or_default();
        trace.extend(self.frames.iter().filter_map(|f| match f.origin {
            FrameOrigin::Definition(def) => Some(def),
            _ => None,
        }));
        trace
    }
}
