use std::sync::Arc;

use indexmap::IndexMap;

use super::cache::{StaticCache, StaticKey};
use super::collection::{CollectionFlavor, CollectionInstance, Element, Index};
use super::concurrent::eval_concurrent;
use super::context::{Context, Frame, FrameOrigin};
use super::error::{EvalError, EvalErrorKind, EvalFrame, EvalResult, Redirection, Unwind};
use super::operators::{apply_binary_operator, apply_unary_operator};
use super::value::{ArgKey, Value};
use crate::lang::ast::*;
use crate::lang::table::DefinitionTable;
use crate::runtime::config::SiteConfig;

macro_rules! debug_enabled { () => { false }; }
macro_rules! debug_log {
    ($format:literal) => {
        enabled_debug_print!(debug_enabled!(), "eval", $format);
    };
    ($format:literal, $($args:expr),*) => {
        enabled_debug_print!(debug_enabled!(), "eval", $format, $($args),*);
    };
}

/// Evaluates constructions of a resolved heap. The engine itself is
/// stateless apart from the shared static cache: everything that belongs to
/// one evaluation path lives in the `Context` passed along.
pub(crate) struct Engine<'a> {
    pub(crate) heap: &'a Heap,
    pub(crate) table: &'a DefinitionTable,
    pub(crate) statics: &'a StaticCache,
    pub(crate) config: &'a SiteConfig,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        heap: &'a Heap, table: &'a DefinitionTable, statics: &'a StaticCache, config: &'a SiteConfig,
    ) -> Self {
        Engine { heap, table, statics, config }
    }

    /// Instantiates `def` with already evaluated arguments.
    pub(crate) fn construct(&self, ctx: &mut Context, def: DefinitionId, args: Vec<Value>) -> EvalResult {
        self.instantiate(ctx, def, args, &[])
    }

    fn instantiate(
        &self, ctx: &mut Context, def: DefinitionId, args: Vec<Value>, indexes: &[Index],
    ) -> EvalResult {
        // Overloads are told apart by the values actually passed
        let (def, signature) = self.table.select_overload(self.heap, def, &args).ok_or_else(|| {
            EvalError::new(
                EvalErrorKind::UnknownDefinition,
                format!("'{}' does not take {} argument(s)", self.heap[def].full_name, args.len()),
            )
        })?;
        let definition = &self.heap[def];
        if definition.is_abstract() {
            return Err(EvalError::new(
                EvalErrorKind::AbstractConstruction,
                format!("'{}' is abstract and cannot be constructed", definition.full_name),
            ).into());
        }

        let params = &definition.signatures[signature].params;
        let mut bound = Vec::with_capacity(params.len());
        for (param, arg) in params.iter().zip(args) {
            bound.push((param.name.clone(), self.heap.convert(arg, param.type_id)?));
        }

        if ctx.depth() >= self.config.max_depth {
            return Err(EvalError::new(
                EvalErrorKind::RecursionLimit,
                format!("constructing '{}' exceeds the depth limit of {}", definition.full_name, self.config.max_depth),
            ).with_frames(self.construction_stack(ctx)).into());
        }

        let value = match definition.durability {
            Durability::Static => {
                // The slot is locked by whoever is generating it, asking again
                // from within that generation would never return
                if ctx.has_frame(FrameOrigin::Definition(def)) {
                    return Err(EvalError::new(
                        EvalErrorKind::RecursionLimit,
                        format!("static '{}' depends on itself", definition.full_name),
                    ).with_frames(self.construction_stack(ctx)).into());
                }
                self.statics
                    .get_or_compute(StaticKey::Definition(def), || self.generate(ctx, def, signature, bound))
                    .map_err(|unwind| unwind.map_error(|err| err.with_frames(self.construction_stack(ctx))))?
            },
            Durability::Dynamic => self.generate(ctx, def, signature, bound)?,
            Durability::Contextual => {
                let values: Vec<Value> = bound.iter().map(|(_, v)| v.clone()).collect();
                let key = ArgKey::new(&values);
                match ctx.cached(def, &key) {
                    Some(value) => value,
                    None => {
                        let value = self.generate(ctx, def, signature, bound)?;
                        ctx.store_cached(def, key, value)
                    },
                }
            },
        };

        self.apply_indexes(ctx, value, indexes)
    }

    /// Runs the body of `def` in a fresh frame. Kept sub-results end up in
    /// the locals of the calling frame.
    fn generate(
        &self, ctx: &mut Context, def: DefinitionId, signature: usize, args: Vec<(String, Value)>,
    ) -> EvalResult {
        debug_log!("generate '{}' ({}), depth {}", self.heap[def].full_name, self.heap[def].durability, ctx.depth());
        ctx.push_frame(Frame::new(FrameOrigin::Definition(def), signature, args));
        let result = self.generate_in_frame(ctx, def)
            .map_err(|unwind| unwind.map_error(|err| err.with_frames(self.construction_stack(ctx))));
        ctx.pop_frame();

        let (value, kept) = result?;
        for (name, kept_value) in kept {
            ctx.put(name, kept_value);
        }
        Ok(value)
    }

    fn generate_in_frame(
        &self, ctx: &mut Context, def: DefinitionId,
    ) -> Result<(Value, Vec<(String, Value)>), Unwind> {
        let definition = &self.heap[def];
        let value = self.eval_node(ctx, definition.body)?;
        let value = self.heap.convert(value, definition.declared_type)?;
        let value = self.settled(ctx, value)?;

        let mut kept = Vec::with_capacity(definition.keeps.len());
        for keep in &definition.keeps {
            if let Some(target) = keep.target {
                kept.push((keep.name.clone(), self.instantiate(ctx, target, Vec::new(), &[])?));
            }
        }
        Ok((value, kept))
    }

    fn construction_stack(&self, ctx: &Context) -> Vec<EvalFrame> {
        ctx.definition_trace()
            .into_iter()
            .map(|def| EvalFrame {
                definition: self.heap[def].full_name.clone(),
                line: self.heap[def].position.line,
            })
            .collect()
    }

    pub(crate) fn eval_node(&self, ctx: &mut Context, id: NodeId) -> EvalResult {
        let node = &self.heap[id];
        let result = if node.is_static() {
            if ctx.has_frame(FrameOrigin::Once(id)) {
                return Err(EvalError::new(
                    EvalErrorKind::RecursionLimit,
                    "static construction depends on itself",
                ).with_position(node.position).with_frames(self.construction_stack(ctx)).into());
            }
            // Stored fully resolved, other requests must not settle it later
            self.statics.get_or_compute(StaticKey::Node(id), || {
                ctx.push_frame(Frame::new(FrameOrigin::Once(id), 0, Vec::new()));
                let result = self.eval_kind(ctx, id).and_then(|value| self.settled(ctx, value));
                ctx.pop_frame();
                result
            })
        } else {
            self.eval_kind(ctx, id)
        };
        result.map_err(|unwind| unwind.map_error(|err| err.with_position(node.position)))
    }

    fn eval_kind(&self, ctx: &mut Context, id: NodeId) -> EvalResult {
        let node = &self.heap[id];
        match &node.kind {
            NodeKind::Literal(literal) => Ok(Value::from_literal(literal)),
            NodeKind::Text(text) => Ok(Value::string(text)),
            NodeKind::Name(name) => self.eval_name(ctx, id, name),
            NodeKind::Unary(op) => {
                let operand = self.eval_node(ctx, self.child(id, 0)?)?;
                let operand = self.settled(ctx, operand)?;
                Ok(apply_unary_operator(*op, &operand)?)
            },
            NodeKind::Chain(ops) => self.eval_chain(ctx, id, ops),
            NodeKind::Isa(test) => self.eval_isa(ctx, id, test),
            NodeKind::Presence(test) => {
                let present = ctx.is_explicit_arg(&test.name) || match &test.binding {
                    Binding::Definition(def) => !self.heap[*def].is_abstract(),
                    Binding::Parameter(param) => ctx.lookup_param(param).is_some(),
                    Binding::Unresolved | Binding::Unknown => ctx.get(&test.name).is_some(),
                };
                Ok(Value::Boolean(present != test.negated))
            },
            NodeKind::Conditional => {
                let test = self.eval_node(ctx, self.child(id, 0)?)?;
                if test.is_truthy() {
                    self.eval_node(ctx, self.child(id, 1)?)
                } else if node.num_children() > 2 {
                    self.eval_node(ctx, self.child(id, 2)?)
                } else {
                    Ok(Value::Void)
                }
            },
            NodeKind::Loop(_) => {
                let values = self.eval_loop(ctx, id)?;
                Ok(CollectionInstance::from_values(values).into())
            },
            NodeKind::Array => {
                let elements = node.children.iter().map(|&child| self.shallow_element(child)).collect();
                Ok(CollectionInstance::array(CollectionFlavor::GrowableArray, elements)?.into())
            },
            NodeKind::Table => self.eval_table(ctx, id),
            NodeKind::TableEntry => {
                Err(EvalError::new(EvalErrorKind::Internal, "table entry evaluated outside of its table").into())
            },
            NodeKind::Block(kind) => self.eval_block(ctx, id, *kind),
            NodeKind::Redirect(kind) => self.eval_redirect(ctx, id, *kind),
            NodeKind::Handler(target) => self.eval_handler(ctx, id, target),
            // Nested definitions only produce something when referenced
            NodeKind::Definition(_) => Ok(Value::Void),
        }
    }

    fn child(&self, id: NodeId, index: usize) -> Result<NodeId, EvalError> {
        Ok(self.heap[id].get_child(index)?)
    }

    /// Resolves the pending elements of a collection value against `ctx`.
    fn settled(&self, ctx: &mut Context, value: Value) -> EvalResult {
        if let Value::Collection(collection) = &value {
            collection.materialize(self, ctx)?;
        }
        Ok(value)
    }

    fn eval_indexes(&self, ctx: &mut Context, nodes: &[NodeId]) -> Result<Vec<Index>, Unwind> {
        let mut indexes = Vec::with_capacity(nodes.len());
        for &node in nodes {
            let value = self.eval_node(ctx, node)?;
            indexes.push(Index::from_value(&value)?);
        }
        Ok(indexes)
    }

    fn apply_indexes(&self, ctx: &mut Context, value: Value, indexes: &[Index]) -> EvalResult {
        let mut value = value;
        for index in indexes {
            value = match &value {
                Value::Collection(collection) => collection.get_resolved_element(self, ctx, index)?,
                other => {
                    return Err(EvalError::usage(format!(
                        "a value of kind {} cannot be indexed with {}", other.kind(), index
                    )).into());
                },
            };
        }
        Ok(value)
    }

    fn eval_name(&self, ctx: &mut Context, id: NodeId, name: &NameRef) -> EvalResult {
        let children = &self.heap[id].children;
        let num_args = name.num_args.min(children.len());
        let (arg_nodes, index_nodes) = children.split_at(num_args);

        let value = match &name.binding {
            Binding::Parameter(param) => match ctx.lookup_param(param) {
                Some(value) => value,
                None => {
                    return Err(EvalError::new(
                        EvalErrorKind::UninitializedObject,
                        format!("parameter '{}' has no value here", param.name),
                    ).into());
                },
            },
            Binding::Definition(def) => {
                if let Some(value) = ctx.local(&name.name).filter(|_| arg_nodes.is_empty()) {
                    value
                } else {
                    let mut args = Vec::with_capacity(arg_nodes.len());
                    for &arg in arg_nodes {
                        let value = self.eval_node(ctx, arg)?;
                        args.push(self.settled(ctx, value)?);
                    }
                    let indexes = self.eval_indexes(ctx, index_nodes)?;
                    return self.instantiate(ctx, *def, args, &indexes);
                }
            },
            Binding::Unresolved | Binding::Unknown => match ctx.get(&name.name) {
                Some(value) => value,
                None if self.config.strict_names => {
                    return Err(EvalError::new(
                        EvalErrorKind::UnknownDefinition,
                        format!("'{}' is not defined", name.name),
                    ).into());
                },
                None => {
                    debug_log!("'{}' is unknown, evaluates to void", name.name);
                    return Ok(Value::Void);
                },
            },
        };

        let indexes = self.eval_indexes(ctx, index_nodes)?;
        self.apply_indexes(ctx, value, &indexes)
    }

    /// Folds the operands left to right. An operand that is a loop
    /// contributes every value it produces.
    fn eval_chain(&self, ctx: &mut Context, id: NodeId, ops: &[BinaryOperator]) -> EvalResult {
        let children = &self.heap[id].children;
        if ops.is_empty() {
            return self.eval_node(ctx, self.child(id, 0)?);
        }

        let mut result: Option<Value> = None;
        for (position, &operand) in children.iter().enumerate() {
            let op = ops[position.saturating_sub(1).min(ops.len() - 1)];

            if let Some(lhs) = &result {
                let decided = match op {
                    BinaryOperator::LogicalAnd if !lhs.is_truthy() => Some(false),
                    BinaryOperator::LogicalOr if lhs.is_truthy() => Some(true),
                    _ => None,
                };
                if let Some(decided) = decided {
                    result = Some(Value::Boolean(decided));
                    continue;
                }
            }

            let values = match &self.heap[operand].kind {
                NodeKind::Loop(_) if !self.heap[operand].is_static() => self.eval_loop(ctx, operand)?,
                _ => {
                    let value = self.eval_node(ctx, operand)?;
                    vec![self.settled(ctx, value)?]
                },
            };
            for value in values {
                result = Some(match result {
                    None => value,
                    Some(lhs) => apply_binary_operator(&lhs, op, &value)?,
                });
            }
        }
        Ok(result.unwrap_or(Value::Void))
    }

    fn eval_isa(&self, ctx: &mut Context, id: NodeId, test: &IsaTest) -> EvalResult {
        let subject = self.child(id, 0)?;

        // A bare reference to a definition tests the definition hierarchy
        let subject_def = match &self.heap[subject].kind {
            NodeKind::Name(NameRef { binding: Binding::Definition(def), .. })
                if self.heap[subject].children.is_empty() && ctx.local(&self.heap[*def].name).is_none() =>
            {
                Some(*def)
            },
            _ => None,
        };
        if let (Some(def), Some(ancestor)) = (subject_def, self.heap.type_definition(test.type_id)) {
            return Ok(Value::Boolean(self.heap.is_subdefinition(def, ancestor)));
        }

        let value = self.eval_node(ctx, subject)?;
        let value = self.settled(ctx, value)?;
        Ok(Value::Boolean(self.heap.is_instance(&value, test.type_id)))
    }

    /// Iterates the collections in lockstep, as far as the shortest one goes.
    /// Tables contribute their values in insertion order.
    pub(crate) fn eval_loop(&self, ctx: &mut Context, id: NodeId) -> Result<Vec<Value>, Unwind> {
        let node = &self.heap[id];
        let scope = match &node.kind {
            NodeKind::Loop(scope) => scope,
            _ => return Err(EvalError::new(EvalErrorKind::Internal, "loop expected").into()),
        };
        let num_collections = node.num_children().saturating_sub(1);
        let body = self.child(id, num_collections)?;

        let mut collections = Vec::with_capacity(num_collections);
        for &child in &node.children[..num_collections] {
            match self.eval_node(ctx, child)? {
                Value::Collection(collection) => collections.push(collection),
                Value::Void => collections.push(Arc::new(CollectionInstance::new(CollectionFlavor::GrowableArray))),
                other => {
                    return Err(EvalError::usage(format!(
                        "cannot iterate over a value of kind {}", other.kind()
                    )).into());
                },
            }
        }

        let indexes: Vec<Vec<Index>> = collections.iter().map(|c| c.indexes()).collect();
        let count = indexes.iter().map(Vec::len).min().unwrap_or(0);
        let mut results = Vec::with_capacity(count);
        for position in 0..count {
            let mut args = Vec::with_capacity(scope.params.len());
            for (param, (collection, keys)) in scope.params.iter().zip(collections.iter().zip(&indexes)) {
                let element = collection.get_resolved_element(self, ctx, &keys[position])?;
                args.push((param.name.clone(), self.heap.convert(element, param.type_id)?));
            }

            ctx.push_frame(Frame::new(FrameOrigin::Loop(id), 0, args));
            let result = self.eval_node(ctx, body).and_then(|value| self.settled(ctx, value));
            ctx.pop_frame();
            results.push(result?);
        }
        Ok(results)
    }

    fn shallow_element(&self, node: NodeId) -> Element {
        match &self.heap[node].kind {
            NodeKind::Literal(literal) => Element::Value(Value::from_literal(literal)),
            NodeKind::Text(text) => Element::Value(Value::string(text)),
            _ => Element::Construction(node),
        }
    }

    fn eval_table(&self, ctx: &mut Context, id: NodeId) -> EvalResult {
        let node = &self.heap[id];
        let mut entries = IndexMap::with_capacity(node.num_children());
        for &entry in &node.children {
            let key = self.eval_node(ctx, self.child(entry, 0)?)?;
            let key = match Index::from_value(&key)? {
                Index::Key(key) => key,
                Index::Int(key) => key.to_string(),
            };
            entries.insert(key, self.shallow_element(self.child(entry, 1)?));
        }
        Ok(CollectionInstance::table(entries).into())
    }

    fn eval_block(&self, ctx: &mut Context, id: NodeId, kind: BlockKind) -> EvalResult {
        let children = &self.heap[id].children;
        let texts = if kind.concurrent && children.len() > 1 {
            eval_concurrent(self, ctx, children)?
        } else {
            let mut texts = Vec::with_capacity(children.len());
            for &child in children {
                texts.push(self.render(ctx, child)?);
            }
            texts
        };
        Ok(Value::from(texts.concat()))
    }

    /// Text a construction contributes to the block it is part of.
    pub(crate) fn render(&self, ctx: &mut Context, id: NodeId) -> Result<String, Unwind> {
        let node = &self.heap[id];
        if let NodeKind::Loop(_) = node.kind {
            if !node.is_static() {
                let values = self.eval_loop(ctx, id)?;
                return Ok(values.iter().map(Value::to_string).collect());
            }
        }
        let value = self.eval_node(ctx, id)?;
        Ok(self.settled(ctx, value)?.to_string())
    }

    fn eval_redirect(&self, ctx: &mut Context, id: NodeId, kind: RedirectKind) -> EvalResult {
        let operand = match self.heap[id].children.first() {
            Some(&child) => Some(self.eval_node(ctx, child)?),
            None => None,
        };

        let signal = match kind {
            RedirectKind::Exit => {
                let status = match operand {
                    Some(value) => Some(value.integral().map(|s| s as i32).ok_or_else(|| {
                        EvalError::usage(format!("exit status '{}' is not a number", value))
                    })?),
                    None => None,
                };
                Redirection::Exit { status }
            },
            RedirectKind::Continue | RedirectKind::Redirect => {
                let target = operand.map(|value| value.to_string()).unwrap_or_default();
                if target.is_empty() {
                    return Err(EvalError::usage("redirection without a target").into());
                }
                if kind == RedirectKind::Continue {
                    Redirection::Continue { target }
                } else {
                    Redirection::Redirect { target }
                }
            },
        };
        debug_log!("raise {}", signal);
        Err(Unwind::Signal(signal))
    }

    fn eval_handler(&self, ctx: &mut Context, id: NodeId, target: &str) -> EvalResult {
        let body = self.child(id, 0)?;
        match self.eval_node(ctx, body) {
            Err(Unwind::Signal(signal)) if signal.target() == Some(target) => {
                debug_log!("handler claims {}", signal);
                let owner = self.heap[id].owner;
                let def = self.table.lookup_scoped(self.heap, owner, target, Some(0)).ok_or_else(|| {
                    EvalError::new(
                        EvalErrorKind::UnknownDefinition,
                        format!("handler target '{}' is not defined", target),
                    )
                })?;
                self.instantiate(ctx, def, Vec::new(), &[])
            },
            other => other,
        }
    }
}
