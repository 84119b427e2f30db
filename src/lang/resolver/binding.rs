use std::collections::HashMap;

use lazy_static::lazy_static;
use maplit::hashmap;

use super::constant;
use super::visitor::{recursive_definition, Ctx, Visitor};
use crate::lang::ast::*;

macro_rules! debug_enabled { () => { false }; }
macro_rules! debug_log {
    ($format:literal) => {
        enabled_debug_print!(debug_enabled!(), "resolver", $format);
    };
    ($format:literal, $($args:expr),*) => {
        enabled_debug_print!(debug_enabled!(), "resolver", $format, $($args),*);
    };
}

lazy_static! {
    static ref PRIMITIVE_TYPES: HashMap<&'static str, ValueKind> = hashmap! {
        "void" => ValueKind::Void,
        "boolean" => ValueKind::Boolean,
        "byte" => ValueKind::Byte,
        "int" => ValueKind::Int,
        "long" => ValueKind::Long,
        "double" => ValueKind::Double,
        "float" => ValueKind::Double,
        "char" => ValueKind::Char,
        "string" => ValueKind::String,
    };
}

/// A name that could not be bound, reported after the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedName {
    pub name: String,
    pub owner: String,
    pub position: InputPosition,
}

/// Binds names, types and keeps. Parameters visible at a point are the ones
/// of every enclosing definition and loop, innermost last.
pub(crate) struct BindingVisitor {
    params: Vec<ParamRef>,
    owner: DefinitionId,
    pub(crate) num_bound: usize,
    pub(crate) unresolved: Vec<UnresolvedName>,
}

impl BindingVisitor {
    pub(crate) fn new() -> Self {
        BindingVisitor {
            params: Vec::with_capacity(32),
            owner: DefinitionId::new_invalid(),
            num_bound: 0,
            unresolved: Vec::new(),
        }
    }

    fn find_param(&self, name: &str) -> Option<&ParamRef> {
        self.params.iter().rev().find(|p| p.name == name)
    }

    fn report(&mut self, ctx: &Ctx, name: &str, position: InputPosition) {
        let owner = if self.owner.is_invalid() {
            String::new()
        } else {
            ctx.heap[self.owner].full_name.clone()
        };
        debug_log!("unresolved '{}' in '{}'", name, owner);
        self.unresolved.push(UnresolvedName { name: name.to_string(), owner, position });
    }

    fn resolve_type_name(&self, ctx: &Ctx, owner: DefinitionId, name: &str) -> TypeTarget {
        if name.is_empty() {
            return TypeTarget::Default;
        }
        if let Some(kind) = PRIMITIVE_TYPES.get(name) {
            return TypeTarget::Primitive(*kind);
        }
        match ctx.table.lookup_scoped(ctx.heap, owner, name, None) {
            Some(def) => TypeTarget::Definition(def),
            None => TypeTarget::Unknown,
        }
    }
}

impl Visitor for BindingVisitor {
    fn visit_definition(&mut self, ctx: &mut Ctx, id: DefinitionId) {
        let old_owner = self.owner;
        let old_num_params = self.params.len();
        self.owner = id;

        // Parameters of all signatures, each name once
        let mut own: Vec<ParamRef> = Vec::new();
        for list in &ctx.heap[id].signatures {
            for param in &list.params {
                if !own.iter().any(|p| p.name == param.name) {
                    own.push(ParamRef { origin: ParamOrigin::Definition(id), name: param.name.clone() });
                }
            }
        }
        self.params.extend(own);

        recursive_definition(self, ctx, id);

        // Keeps bind to direct children of the definition
        let keeps = ctx.heap[id].keeps.clone();
        for (index, keep) in keeps.iter().enumerate() {
            let target = ctx.heap[id].children.iter().copied().find(|&c| ctx.heap[c].name == keep.name);
            if target.is_none() {
                let position = ctx.heap[id].position;
                self.report(ctx, &keep.name, position);
            }
            ctx.heap[id].keeps[index].target = target;
        }

        self.params.truncate(old_num_params);
        self.owner = old_owner;
    }

    fn visit_type(&mut self, ctx: &mut Ctx, owner: DefinitionId, id: TypeId) {
        let name = ctx.heap[id].name.clone();
        let target = self.resolve_type_name(ctx, owner, &name);
        if target == TypeTarget::Unknown {
            let position = ctx.heap[id].position;
            self.report(ctx, &name, position);
        }

        let super_type = match target {
            TypeTarget::Definition(def) => {
                let super_id = ctx.heap[def].super_type;
                if super_id.is_invalid() {
                    TypeTarget::Default
                } else {
                    let super_name = ctx.heap[super_id].name.clone();
                    self.resolve_type_name(ctx, ctx.heap[def].owner, &super_name)
                }
            },
            _ => TypeTarget::Default,
        };

        // Dimension bounds may refer to other definitions, fold them now
        let mut bounds = Vec::with_capacity(ctx.heap[id].dims.len());
        for dim in ctx.heap[id].dims.clone() {
            let bound = match dim.category {
                CollectionCategory::Table => Bound::Keyed(ValueKind::String),
                CollectionCategory::Array if dim.bound_expr.is_invalid() => Bound::Open,
                CollectionCategory::Array => {
                    self.visit_node(ctx, dim.bound_expr);
                    let folded = constant::fold(ctx.heap, ctx.table, owner, dim.bound_expr);
                    match folded.as_ref().and_then(|v| v.integral()) {
                        Some(size) if size >= 0 => Bound::Fixed(size as usize),
                        _ => {
                            let position = ctx.heap[id].position;
                            self.report(ctx, &format!("{}[..]", name), position);
                            Bound::Unresolved
                        },
                    }
                },
            };
            bounds.push(bound);
        }

        let ty = &mut ctx.heap[id];
        ty.target = target;
        ty.super_type = super_type;
        for (dim, bound) in ty.dims.iter_mut().zip(bounds) {
            dim.bound = bound;
        }
        self.num_bound += 1;
    }

    fn visit_loop_node(&mut self, ctx: &mut Ctx, id: NodeId) {
        let (num_collections, body, params) = match &ctx.heap[id].kind {
            NodeKind::Loop(scope) => {
                let node = &ctx.heap[id];
                (node.num_children().saturating_sub(1), node.children.last().copied(), scope.params.clone())
            },
            _ => unreachable!(),
        };

        let collections: Vec<NodeId> = ctx.heap[id].children[..num_collections].to_vec();
        for collection in collections {
            self.visit_node(ctx, collection);
        }
        let owner = self.owner;
        for param in &params {
            if !param.type_id.is_invalid() {
                self.visit_type(ctx, owner, param.type_id);
            }
        }

        // Outer parameters first, the induction variables appended
        let old_num_params = self.params.len();
        self.params.extend(params.iter().map(|p| ParamRef {
            origin: ParamOrigin::Loop(id),
            name: p.name.clone(),
        }));
        if let NodeKind::Loop(scope) = &mut ctx.heap[id].kind {
            scope.merged = self.params.clone();
        }

        if let Some(body) = body {
            self.visit_node(ctx, body);
        }
        self.params.truncate(old_num_params);
    }

    fn visit_name_node(&mut self, ctx: &mut Ctx, id: NodeId) {
        let (name, num_args) = match &ctx.heap[id].kind {
            NodeKind::Name(name) => (name.name.clone(), name.num_args),
            _ => unreachable!(),
        };

        let (binding, signature) = match self.find_param(&name) {
            Some(param) if num_args == 0 => (Binding::Parameter(param.clone()), None),
            _ => match ctx.table.lookup_scoped(ctx.heap, self.owner, &name, Some(num_args)) {
                Some(def) => (Binding::Definition(def), ctx.heap[def].accepts_arity(num_args)),
                None => {
                    let position = ctx.heap[id].position;
                    self.report(ctx, &name, position);
                    (Binding::Unknown, None)
                },
            },
        };

        if let NodeKind::Name(name) = &mut ctx.heap[id].kind {
            name.binding = binding;
            name.signature = signature;
        }
        self.num_bound += 1;
    }

    fn visit_presence_node(&mut self, ctx: &mut Ctx, id: NodeId) {
        let name = match &ctx.heap[id].kind {
            NodeKind::Presence(test) => test.name.clone(),
            _ => unreachable!(),
        };

        // Presence only asks whether the name exists, so any arity will do
        let binding = match self.find_param(&name) {
            Some(param) => Binding::Parameter(param.clone()),
            None => match ctx.table.lookup_scoped(ctx.heap, self.owner, &name, None) {
                Some(def) => Binding::Definition(def),
                None => Binding::Unknown,
            },
        };

        if let NodeKind::Presence(test) = &mut ctx.heap[id].kind {
            test.binding = binding;
        }
        self.num_bound += 1;
    }

    fn visit_isa_node(&mut self, ctx: &mut Ctx, id: NodeId) {
        let type_id = match &ctx.heap[id].kind {
            NodeKind::Isa(test) => test.type_id,
            _ => unreachable!(),
        };
        let owner = self.owner;
        self.visit_type(ctx, owner, type_id);
    }
}

impl Default for BindingVisitor {
    fn default() -> Self {
        Self::new()
    }
}
