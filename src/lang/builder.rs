//! Allocation boundary of the language core. The parser is an external
//! collaborator: it (or a test) describes definitions as plain `Syntax` and
//! `DefinitionSpec` trees and the builder moves them into a `Heap`, filling
//! in the parent/owner links, the node classification and the qualified
//! names along the way.

use super::ast::*;

/// Expression and statement syntax as produced by the parser.
#[derive(Debug, Clone)]
pub enum Syntax {
    Literal(Literal),
    Text(String),
    Name { name: String, args: Vec<Syntax>, indexes: Vec<Syntax> },
    Unary(UnaryOperator, Box<Syntax>),
    Chain { first: Box<Syntax>, rest: Vec<(BinaryOperator, Syntax)> },
    Isa(Box<Syntax>, TypeSpec),
    Presence { name: String, negated: bool },
    If { test: Box<Syntax>, then: Box<Syntax>, otherwise: Option<Box<Syntax>> },
    For { params: Vec<ParamSpec>, collections: Vec<Syntax>, body: Box<Syntax> },
    Array(Vec<Syntax>),
    Table(Vec<(Syntax, Syntax)>),
    Block { concurrent: bool, items: Vec<Syntax> },
    Redirect(RedirectKind, Option<Box<Syntax>>),
    Handler { target: String, body: Box<Syntax> },
    Definition(Box<DefinitionSpec>),
    /// Anonymous construction computed once per process
    Static(Box<Syntax>),
}

impl Syntax {
    pub fn void() -> Syntax {
        Syntax::Literal(Literal::Void)
    }
    pub fn boolean(v: bool) -> Syntax {
        Syntax::Literal(Literal::Boolean(v))
    }
    pub fn int(v: i32) -> Syntax {
        Syntax::Literal(Literal::Int(v))
    }
    pub fn long(v: i64) -> Syntax {
        Syntax::Literal(Literal::Long(v))
    }
    pub fn double(v: f64) -> Syntax {
        Syntax::Literal(Literal::Double(v))
    }
    pub fn string<S: Into<String>>(v: S) -> Syntax {
        Syntax::Literal(Literal::String(v.into()))
    }
    pub fn text<S: Into<String>>(v: S) -> Syntax {
        Syntax::Text(v.into())
    }
    pub fn name<S: Into<String>>(name: S) -> Syntax {
        Syntax::Name { name: name.into(), args: Vec::new(), indexes: Vec::new() }
    }
    pub fn call<S: Into<String>>(name: S, args: Vec<Syntax>) -> Syntax {
        Syntax::Name { name: name.into(), args, indexes: Vec::new() }
    }
    pub fn index<S: Into<String>>(name: S, indexes: Vec<Syntax>) -> Syntax {
        Syntax::Name { name: name.into(), args: Vec::new(), indexes }
    }
    pub fn unary(op: UnaryOperator, operand: Syntax) -> Syntax {
        Syntax::Unary(op, Box::new(operand))
    }
    pub fn binary(lhs: Syntax, op: BinaryOperator, rhs: Syntax) -> Syntax {
        Syntax::Chain { first: Box::new(lhs), rest: vec![(op, rhs)] }
    }
    pub fn chain(first: Syntax, rest: Vec<(BinaryOperator, Syntax)>) -> Syntax {
        Syntax::Chain { first: Box::new(first), rest }
    }
    pub fn isa(subject: Syntax, ty: TypeSpec) -> Syntax {
        Syntax::Isa(Box::new(subject), ty)
    }
    pub fn with<S: Into<String>>(name: S) -> Syntax {
        Syntax::Presence { name: name.into(), negated: false }
    }
    pub fn without<S: Into<String>>(name: S) -> Syntax {
        Syntax::Presence { name: name.into(), negated: true }
    }
    pub fn if_then(test: Syntax, then: Syntax, otherwise: Option<Syntax>) -> Syntax {
        Syntax::If { test: Box::new(test), then: Box::new(then), otherwise: otherwise.map(Box::new) }
    }
    pub fn for_each(params: Vec<ParamSpec>, collections: Vec<Syntax>, body: Syntax) -> Syntax {
        Syntax::For { params, collections, body: Box::new(body) }
    }
    pub fn array(elements: Vec<Syntax>) -> Syntax {
        Syntax::Array(elements)
    }
    pub fn table(entries: Vec<(Syntax, Syntax)>) -> Syntax {
        Syntax::Table(entries)
    }
    pub fn block(items: Vec<Syntax>) -> Syntax {
        Syntax::Block { concurrent: false, items }
    }
    pub fn concurrent(items: Vec<Syntax>) -> Syntax {
        Syntax::Block { concurrent: true, items }
    }
    pub fn redirect<S: Into<String>>(target: S) -> Syntax {
        Syntax::Redirect(RedirectKind::Redirect, Some(Box::new(Syntax::string(target))))
    }
    pub fn continue_to<S: Into<String>>(target: S) -> Syntax {
        Syntax::Redirect(RedirectKind::Continue, Some(Box::new(Syntax::string(target))))
    }
    pub fn exit(status: Option<i32>) -> Syntax {
        Syntax::Redirect(RedirectKind::Exit, status.map(|s| Box::new(Syntax::int(s))))
    }
    pub fn handler<S: Into<String>>(target: S, body: Syntax) -> Syntax {
        Syntax::Handler { target: target.into(), body: Box::new(body) }
    }
    pub fn definition(spec: DefinitionSpec) -> Syntax {
        Syntax::Definition(Box::new(spec))
    }
    pub fn once(inner: Syntax) -> Syntax {
        Syntax::Static(Box::new(inner))
    }
}

#[derive(Debug, Clone)]
pub enum DimSpec {
    /// Array dimension, growable if no bound expression is given
    Array(Option<Syntax>),
    Table,
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: String,
    pub dims: Vec<DimSpec>,
}

impl TypeSpec {
    pub fn named<S: Into<String>>(name: S) -> TypeSpec {
        TypeSpec { name: name.into(), dims: Vec::new() }
    }
    pub fn array_of<S: Into<String>>(name: S, bound: Option<Syntax>) -> TypeSpec {
        TypeSpec { name: name.into(), dims: vec![DimSpec::Array(bound)] }
    }
    pub fn table_of<S: Into<String>>(name: S) -> TypeSpec {
        TypeSpec { name: name.into(), dims: vec![DimSpec::Table] }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: Option<TypeSpec>,
}

impl ParamSpec {
    pub fn new<S: Into<String>>(name: S) -> ParamSpec {
        ParamSpec { name: name.into(), ty: None }
    }
    pub fn typed<S: Into<String>>(name: S, ty: TypeSpec) -> ParamSpec {
        ParamSpec { name: name.into(), ty: Some(ty) }
    }
}

/// Description of one definition and everything nested in it.
#[derive(Debug, Clone)]
pub struct DefinitionSpec {
    pub name: String,
    pub line: u32,
    pub access: Access,
    pub durability: Durability,
    pub is_site: bool,
    pub declared_type: Option<TypeSpec>,
    pub super_type: Option<TypeSpec>,
    pub signatures: Vec<Vec<ParamSpec>>,
    pub body: Option<Syntax>,
    pub children: Vec<DefinitionSpec>,
    pub keeps: Vec<String>,
}

impl DefinitionSpec {
    pub fn new<S: Into<String>>(name: S) -> Self {
        DefinitionSpec {
            name: name.into(),
            line: 0,
            access: Access::Public,
            durability: Durability::Dynamic,
            is_site: false,
            declared_type: None,
            super_type: None,
            signatures: Vec::new(),
            body: None,
            children: Vec::new(),
            keeps: Vec::new(),
        }
    }

    pub fn site<S: Into<String>>(name: S) -> Self {
        DefinitionSpec { is_site: true, ..DefinitionSpec::new(name) }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }
    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }
    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }
    pub fn typed(mut self, ty: TypeSpec) -> Self {
        self.declared_type = Some(ty);
        self
    }
    pub fn extends(mut self, ty: TypeSpec) -> Self {
        self.super_type = Some(ty);
        self
    }
    pub fn params(mut self, params: Vec<ParamSpec>) -> Self {
        self.signatures.push(params);
        self
    }
    pub fn body(mut self, body: Syntax) -> Self {
        self.body = Some(body);
        self
    }
    pub fn child(mut self, child: DefinitionSpec) -> Self {
        self.children.push(child);
        self
    }
    pub fn keep<S: Into<String>>(mut self, name: S) -> Self {
        self.keeps.push(name.into());
        self
    }
}

/// Moves specs into a heap. Definitions added through `add_root` become
/// roots of the domain.
#[derive(Debug, Default)]
pub struct HeapBuilder {
    heap: Heap,
}

impl HeapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, spec: DefinitionSpec) -> DefinitionId {
        let id = alloc_definition(&mut self.heap, DefinitionId::new_invalid(), spec);
        self.heap.roots.push(id);
        id
    }

    pub fn finish(self) -> Heap {
        self.heap
    }
}

/// Allocates `spec` below `owner` (invalid for a root) without linking it
/// into the owner's children. Nested definitions of the spec are linked to
/// the new definition.
pub(crate) fn alloc_definition(heap: &mut Heap, owner: DefinitionId, spec: DefinitionSpec) -> DefinitionId {
    let full_name = if owner.is_invalid() {
        spec.name.clone()
    } else {
        format!("{}.{}", heap[owner].full_name, spec.name)
    };
    let position = InputPosition { line: spec.line, column: 0 };
    let category = if spec.is_site {
        DefinitionCategory::Site
    } else {
        match spec.declared_type.as_ref().and_then(|ty| ty.dims.first()) {
            Some(DimSpec::Array(_)) => DefinitionCategory::Collection(CollectionCategory::Array),
            Some(DimSpec::Table) => DefinitionCategory::Collection(CollectionCategory::Table),
            None => DefinitionCategory::Value,
        }
    };

    let this = heap.definitions.alloc_with_id(|this| Definition {
        this,
        position,
        name: spec.name.clone(),
        full_name,
        owner,
        access: spec.access,
        durability: spec.durability,
        category,
        declared_type: TypeId::new_invalid(),
        super_type: TypeId::new_invalid(),
        signatures: Vec::new(),
        body: NodeId::new_invalid(),
        children: Vec::new(),
        keeps: spec.keeps.iter().map(|name| Keep { name: name.clone(), target: None }).collect(),
    });

    let declared_type = match spec.declared_type {
        Some(ty) => alloc_type(heap, this, position, ty),
        None => TypeId::new_invalid(),
    };
    let super_type = match spec.super_type {
        Some(ty) => alloc_type(heap, this, position, ty),
        None => TypeId::new_invalid(),
    };
    let mut signatures = Vec::with_capacity(spec.signatures.len().max(1));
    for params in spec.signatures {
        let params = params.into_iter().map(|p| alloc_parameter(heap, this, position, p)).collect();
        signatures.push(ParameterList { params });
    }
    if signatures.is_empty() {
        signatures.push(ParameterList::default());
    }

    {
        let def = &mut heap[this];
        def.declared_type = declared_type;
        def.super_type = super_type;
        def.signatures = signatures;
    }

    for child in spec.children {
        let child = alloc_definition(heap, this, child);
        heap[this].children.push(child);
    }

    if let Some(body) = spec.body {
        let body = alloc_node(heap, this, NodeId::new_invalid(), position, body, true);
        heap[this].body = body;
    }

    this
}

fn alloc_parameter(heap: &mut Heap, owner: DefinitionId, position: InputPosition, spec: ParamSpec) -> Parameter {
    let type_id = match spec.ty {
        Some(ty) => alloc_type(heap, owner, position, ty),
        None => TypeId::new_invalid(),
    };
    Parameter { name: spec.name, type_id }
}

fn alloc_type(heap: &mut Heap, owner: DefinitionId, position: InputPosition, spec: TypeSpec) -> TypeId {
    let TypeSpec { name, dims: dim_specs } = spec;
    let mut dims = Vec::with_capacity(dim_specs.len());
    for dim in dim_specs {
        dims.push(match dim {
            DimSpec::Array(bound) => Dimension {
                category: CollectionCategory::Array,
                bound_expr: match bound {
                    Some(bound) => alloc_node(heap, owner, NodeId::new_invalid(), position, bound, false),
                    None => NodeId::new_invalid(),
                },
                bound: Bound::Unresolved,
            },
            DimSpec::Table => Dimension {
                category: CollectionCategory::Table,
                bound_expr: NodeId::new_invalid(),
                bound: Bound::Unresolved,
            },
        });
    }
    heap.types.alloc_with_id(|this| Type {
        this,
        position,
        name,
        dims,
        target: TypeTarget::Unresolved,
        super_type: TypeTarget::Unresolved,
    })
}

/// Allocates a node and its subtree. `construction` marks the statements of
/// a block (and definition bodies), which are classified as dynamic unless
/// they are primitive, static or definitions.
fn alloc_node(
    heap: &mut Heap, owner: DefinitionId, parent: NodeId, position: InputPosition,
    syntax: Syntax, construction: bool,
) -> NodeId {
    let (syntax, is_static) = match syntax {
        Syntax::Static(inner) => (*inner, true),
        other => (other, false),
    };

    let (kind, children, class): (NodeKind, Vec<Pending>, NodeClass) = match syntax {
        Syntax::Literal(literal) => (NodeKind::Literal(literal), Vec::new(), NodeClass::Primitive),
        Syntax::Text(text) => (NodeKind::Text(text), Vec::new(), NodeClass::Primitive),
        Syntax::Name { name, args, indexes } => {
            let num_args = args.len();
            let children = args.into_iter().chain(indexes).map(Pending::expression).collect();
            let name = NameRef { name, num_args, binding: Binding::Unresolved, signature: None };
            (NodeKind::Name(name), children, NodeClass::Plain)
        },
        Syntax::Unary(op, operand) => {
            (NodeKind::Unary(op), vec![Pending::expression(*operand)], NodeClass::Plain)
        },
        Syntax::Chain { first, rest } => {
            let mut ops = Vec::with_capacity(rest.len());
            let mut children = vec![Pending::expression(*first)];
            for (op, operand) in rest {
                ops.push(op);
                children.push(Pending::expression(operand));
            }
            (NodeKind::Chain(ops), children, NodeClass::Plain)
        },
        Syntax::Isa(subject, ty) => {
            let type_id = alloc_type(heap, owner, position, ty);
            (NodeKind::Isa(IsaTest { type_id }), vec![Pending::expression(*subject)], NodeClass::Plain)
        },
        Syntax::Presence { name, negated } => {
            let test = PresenceTest { name, negated, binding: Binding::Unresolved };
            (NodeKind::Presence(test), Vec::new(), NodeClass::Plain)
        },
        Syntax::If { test, then, otherwise } => {
            let mut children = vec![Pending::expression(*test), Pending::construction(*then)];
            if let Some(otherwise) = otherwise {
                children.push(Pending::construction(*otherwise));
            }
            (NodeKind::Conditional, children, NodeClass::Plain)
        },
        Syntax::For { params, collections, body } => {
            let params = params.into_iter().map(|p| alloc_parameter(heap, owner, position, p)).collect();
            let mut children: Vec<Pending> = collections.into_iter().map(Pending::expression).collect();
            children.push(Pending::construction(*body));
            (NodeKind::Loop(LoopScope { params, merged: Vec::new() }), children, NodeClass::Plain)
        },
        Syntax::Array(elements) => {
            let children = elements.into_iter().map(Pending::construction).collect();
            (NodeKind::Array, children, NodeClass::Plain)
        },
        Syntax::Table(entries) => {
            let children = entries.into_iter().map(|(key, value)| Pending::Entry(key, value)).collect();
            (NodeKind::Table, children, NodeClass::Plain)
        },
        Syntax::Block { concurrent, items } => {
            let children = items.into_iter().map(Pending::construction).collect();
            (NodeKind::Block(BlockKind { concurrent }), children, NodeClass::Plain)
        },
        Syntax::Redirect(kind, target) => {
            let children = target.into_iter().map(|t| Pending::expression(*t)).collect();
            (NodeKind::Redirect(kind), children, NodeClass::Plain)
        },
        Syntax::Handler { target, body } => {
            (NodeKind::Handler(target), vec![Pending::construction(*body)], NodeClass::Plain)
        },
        Syntax::Definition(spec) => {
            let def = alloc_definition(heap, owner, *spec);
            heap[owner].children.push(def);
            (NodeKind::Definition(def), Vec::new(), NodeClass::Definition)
        },
        Syntax::Static(inner) => {
            // Nested markers collapse into one
            return alloc_node(heap, owner, parent, position, Syntax::Static(inner), construction);
        },
    };

    let class = match class {
        NodeClass::Plain if is_static => NodeClass::Static,
        NodeClass::Plain if construction => NodeClass::Dynamic,
        class => class,
    };

    let this = heap.nodes.alloc_with_id(|this| Node {
        this,
        position,
        parent,
        owner,
        class,
        children: Vec::new(),
        kind,
    });

    let mut child_ids = Vec::with_capacity(children.len());
    for child in children {
        child_ids.push(match child {
            Pending::Node(syntax, construction) => {
                alloc_node(heap, owner, this, position, syntax, construction)
            },
            Pending::Entry(key, value) => alloc_table_entry(heap, owner, this, position, key, value),
        });
    }
    heap[this].children = child_ids;
    this
}

/// Child of a node that still has to be allocated.
enum Pending {
    Node(Syntax, bool),
    Entry(Syntax, Syntax),
}

impl Pending {
    fn expression(syntax: Syntax) -> Pending {
        Pending::Node(syntax, false)
    }
    fn construction(syntax: Syntax) -> Pending {
        Pending::Node(syntax, true)
    }
}

fn alloc_table_entry(
    heap: &mut Heap, owner: DefinitionId, parent: NodeId, position: InputPosition,
    key: Syntax, value: Syntax,
) -> NodeId {
    let this = heap.nodes.alloc_with_id(|this| Node {
        this,
        position,
        parent,
        owner,
        class: NodeClass::Plain,
        children: Vec::new(),
        kind: NodeKind::TableEntry,
    });
    let key = alloc_node(heap, owner, this, position, key, false);
    let value = alloc_node(heap, owner, this, position, value, true);
    heap[this].children = vec![key, value];
    this
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_and_names() {
        let mut builder = HeapBuilder::new();
        let site = builder.add_root(
            DefinitionSpec::site("shop").child(
                DefinitionSpec::new("greeting").body(Syntax::block(vec![
                    Syntax::text("hello "),
                    Syntax::name("who"),
                    Syntax::definition(DefinitionSpec::new("who").body(Syntax::string("world"))),
                ])),
            ),
        );
        let heap = builder.finish();

        let greeting = heap[site].children[0];
        assert_eq!(heap[greeting].full_name, "shop.greeting");
        assert_eq!(heap[greeting].owner, site);
        assert_eq!(heap[greeting].signatures.len(), 1);

        let nested = heap[greeting].children[0];
        assert_eq!(heap[nested].full_name, "shop.greeting.who");

        let body = &heap.nodes[heap[greeting].body];
        assert!(body.parent.is_invalid());
        assert_eq!(body.num_children(), 3);
        let text = &heap.nodes[body.get_child(0).unwrap()];
        assert!(text.is_primitive());
        assert_eq!(text.parent, body.this);
        let name = &heap.nodes[body.get_child(1).unwrap()];
        assert!(name.is_dynamic());
        assert_eq!(name.owner, greeting);
        assert!(heap.nodes[body.get_child(2).unwrap()].is_definition());
        assert_eq!(body.get_child(3).unwrap_err().len, 3);
    }

    #[test]
    fn test_classification_is_exclusive() {
        let mut builder = HeapBuilder::new();
        let def = builder.add_root(DefinitionSpec::new("page").body(Syntax::block(vec![
            Syntax::once(Syntax::name("banner")),
            Syntax::binary(Syntax::int(1), BinaryOperator::Add, Syntax::int(2)),
        ])));
        let heap = builder.finish();

        let body = &heap.nodes[heap[def].body];
        let once = &heap.nodes[body.children[0]];
        assert!(once.is_static() && !once.is_dynamic() && !once.is_definition());
        let sum = &heap.nodes[body.children[1]];
        assert!(sum.is_dynamic() && !sum.is_static());
        // Operands are plain expressions
        assert!(heap.nodes[sum.children[0]].is_primitive());
        for (_, node) in heap.nodes.iter() {
            if node.is_primitive() {
                assert_eq!(node.num_children(), 0);
            }
        }
    }
}
