use crate::lang::ast::*;
use crate::lang::table::DefinitionTable;

/// General context structure that is used while traversing the tree.
pub(crate) struct Ctx<'p> {
    pub heap: &'p mut Heap,
    pub table: &'p DefinitionTable,
}

/// Visitor is a generic trait that walks the tree depth-first. The default
/// implementations recurse into children before calling the hook of the node
/// itself, so hooks always see resolved children. The exception are loops,
/// whose hook is responsible for visiting its own children because it has
/// to set up the iteration scope first.
pub(crate) trait Visitor {
    // Entry point
    fn visit_heap(&mut self, ctx: &mut Ctx) {
        let roots = ctx.heap.roots().to_vec();
        for def in roots {
            self.visit_definition(ctx, def);
        }
    }

    fn visit_definition(&mut self, ctx: &mut Ctx, id: DefinitionId) {
        recursive_definition(self, ctx, id);
    }

    fn visit_type(&mut self, _ctx: &mut Ctx, _owner: DefinitionId, _id: TypeId) {}

    fn visit_node(&mut self, ctx: &mut Ctx, id: NodeId) {
        let kind = NodeHook::of(&ctx.heap[id].kind);
        match kind {
            NodeHook::Loop => self.visit_loop_node(ctx, id),
            NodeHook::Definition => {
                // Nested definitions are visited as children of their owner
            },
            _ => {
                recursive_children(self, ctx, id);
                match kind {
                    NodeHook::Name => self.visit_name_node(ctx, id),
                    NodeHook::Presence => self.visit_presence_node(ctx, id),
                    NodeHook::Isa => self.visit_isa_node(ctx, id),
                    _ => {},
                }
            },
        }
    }

    fn visit_loop_node(&mut self, ctx: &mut Ctx, id: NodeId) {
        recursive_children(self, ctx, id);
    }
    fn visit_name_node(&mut self, _ctx: &mut Ctx, _id: NodeId) {}
    fn visit_presence_node(&mut self, _ctx: &mut Ctx, _id: NodeId) {}
    fn visit_isa_node(&mut self, _ctx: &mut Ctx, _id: NodeId) {}
}

#[derive(Clone, Copy)]
enum NodeHook {
    Loop,
    Definition,
    Name,
    Presence,
    Isa,
    None,
}

impl NodeHook {
    fn of(kind: &NodeKind) -> NodeHook {
        match kind {
            NodeKind::Loop(_) => NodeHook::Loop,
            NodeKind::Definition(_) => NodeHook::Definition,
            NodeKind::Name(_) => NodeHook::Name,
            NodeKind::Presence(_) => NodeHook::Presence,
            NodeKind::Isa(_) => NodeHook::Isa,
            _ => NodeHook::None,
        }
    }
}

pub(crate) fn recursive_definition<V: Visitor + ?Sized>(v: &mut V, ctx: &mut Ctx, id: DefinitionId) {
    let def = &ctx.heap[id];
    let mut types = vec![def.declared_type, def.super_type];
    types.extend(def.signatures.iter().flat_map(|s| s.params.iter().map(|p| p.type_id)));
    let children = def.children.clone();
    let body = def.body;

    for type_id in types.into_iter().filter(|t| !t.is_invalid()) {
        v.visit_type(ctx, id, type_id);
    }
    for child in children {
        v.visit_definition(ctx, child);
    }
    if !body.is_invalid() {
        v.visit_node(ctx, body);
    }
}

pub(crate) fn recursive_children<V: Visitor + ?Sized>(v: &mut V, ctx: &mut Ctx, id: NodeId) {
    let children = ctx.heap[id].children.clone();
    for child in children {
        v.visit_node(ctx, child);
    }
}
