use std::fmt;
use std::ops::{Index, IndexMut};

use super::arena::{Arena, Id};

/// Helper macro that defines a type alias for a tree element ID, together with
/// the `Index` and `IndexMut` implementations on the `Heap`.
macro_rules! define_aliased_ast_id {
    ($name:ident, $parent:ty) => {
        pub type $name = $parent;
    };
    (
        $name:ident, $parent:ty,
        index($indexed_type:ty, $indexed_arena:ident)
    ) => {
        define_aliased_ast_id!($name, $parent);
        impl Index<$name> for Heap {
            type Output = $indexed_type;
            fn index(&self, index: $name) -> &Self::Output {
                &self.$indexed_arena[index]
            }
        }

        impl IndexMut<$name> for Heap {
            fn index_mut(&mut self, index: $name) -> &mut Self::Output {
                &mut self.$indexed_arena[index]
            }
        }
    };
}

define_aliased_ast_id!(NodeId, Id<Node>, index(Node, nodes));
define_aliased_ast_id!(DefinitionId, Id<Definition>, index(Definition, definitions));
define_aliased_ast_id!(TypeId, Id<Type>, index(Type, types));

/// Position in the source that the (external) parser annotated an element
/// with. Only used for error reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InputPosition {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for InputPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Storage of a complete compiled domain: every node, definition and type
/// expression lives in one of the arenas. `roots` contains the top-level
/// definitions (usually sites).
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct Heap {
    pub(crate) nodes: Arena<Node>,
    pub(crate) definitions: Arena<Definition>,
    pub(crate) types: Arena<Type>,
    pub(crate) roots: Vec<DefinitionId>,
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            nodes: Arena::new(),
            definitions: Arena::new(),
            types: Arena::new(),
            roots: Vec::new(),
        }
    }

    pub fn roots(&self) -> &[DefinitionId] {
        &self.roots
    }

    pub fn num_definitions(&self) -> usize {
        self.definitions.len()
    }

    pub fn definition_ids(&self) -> impl Iterator<Item = DefinitionId> {
        self.definitions.ids()
    }

    /// Walks the owner chain starting at (and including) `def`.
    pub fn owner_chain(&self, def: DefinitionId) -> OwnerChain<'_> {
        OwnerChain { heap: self, next: def }
    }

    /// Returns true if `def` is `ancestor` or lies somewhere beneath it.
    pub fn is_within(&self, def: DefinitionId, ancestor: DefinitionId) -> bool {
        self.owner_chain(def).any(|id| id == ancestor)
    }

    /// Outermost definition enclosing `def`, i.e. its site.
    pub fn root_of(&self, def: DefinitionId) -> DefinitionId {
        self.owner_chain(def).last().unwrap_or(def)
    }
}

pub struct OwnerChain<'h> {
    heap: &'h Heap,
    next: DefinitionId,
}

impl Iterator for OwnerChain<'_> {
    type Item = DefinitionId;
    fn next(&mut self) -> Option<DefinitionId> {
        if self.next.is_invalid() {
            return None;
        }
        let current = self.next;
        self.next = self.heap[current].owner;
        Some(current)
    }
}

//------------------------------------------------------------------------------
// Nodes
//------------------------------------------------------------------------------

/// Classification of a node. A node is exactly one of these, so the
/// mutual exclusion of the primitive/static/dynamic/definition flags holds by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NodeClass {
    Plain,
    Primitive,
    Static,
    Dynamic,
    Definition,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub this: NodeId,
    pub position: InputPosition,
    // Tree ancestor, invalid for the root node of a definition body
    pub parent: NodeId,
    // Innermost enclosing definition. Namespace back-reference only.
    pub owner: DefinitionId,
    pub class: NodeClass,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildOutOfRange {
    pub index: usize,
    pub len: usize,
}

impl fmt::Display for ChildOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "child {} requested from a node with {} children", self.index, self.len)
    }
}

impl std::error::Error for ChildOutOfRange {}

impl Node {
    pub fn get_child(&self, n: usize) -> Result<NodeId, ChildOutOfRange> {
        self.children
            .get(n)
            .copied()
            .ok_or(ChildOutOfRange { index: n, len: self.children.len() })
    }
    pub fn num_children(&self) -> usize {
        self.children.len()
    }
    pub fn is_primitive(&self) -> bool {
        self.class == NodeClass::Primitive
    }
    pub fn is_static(&self) -> bool {
        self.class == NodeClass::Static
    }
    pub fn is_dynamic(&self) -> bool {
        self.class == NodeClass::Dynamic
    }
    pub fn is_definition(&self) -> bool {
        self.class == NodeClass::Definition
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    /// Literal value, no children
    Literal(Literal),
    /// Static text emitted as-is by a block, no children
    Text(String),
    /// Reference to a parameter or definition. Children are the arguments
    /// followed by the indexes.
    Name(NameRef),
    /// Children: [operand]
    Unary(UnaryOperator),
    /// Multi-operand chain. Children are the operands, there is one operator
    /// less than there are operands.
    Chain(Vec<BinaryOperator>),
    /// "isa" test. Children: [subject]
    Isa(IsaTest),
    /// "with"/"without" test, no children
    Presence(PresenceTest),
    /// Children: [test, then] or [test, then, else]
    Conditional,
    /// Children: one collection expression per loop parameter, then the body
    Loop(LoopScope),
    /// Children: elements
    Array,
    /// Children: `TableEntry` nodes
    Table,
    /// Children: [key, value]
    TableEntry,
    /// Children: the constructions of the block
    Block(BlockKind),
    /// Children: [target] for continue/redirect, [] or [status] for exit
    Redirect(RedirectKind),
    /// Claims redirections to `target` raised by its body. Children: [body]
    Handler(String),
    /// Placeholder for a nested definition inside a block, no children
    Definition(DefinitionId),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Literal {
    Void,
    Boolean(bool),
    Byte(u8),
    Int(i32),
    Long(i64),
    Double(f64),
    Char(char),
    String(String),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NameRef {
    pub name: String,
    pub num_args: usize,
    // Phase 2: resolver
    pub binding: Binding,
    pub signature: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Binding {
    Unresolved,
    Parameter(ParamRef),
    Definition(DefinitionId),
    /// Resolution failed or was deferred
    Unknown,
}

impl Binding {
    pub fn is_unresolved(&self) -> bool {
        match self {
            Binding::Unresolved | Binding::Unknown => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ParamOrigin {
    Definition(DefinitionId),
    Loop(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParamRef {
    pub origin: ParamOrigin,
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoopScope {
    pub params: Vec<Parameter>,
    // Phase 2: enclosing parameters followed by `params`
    pub merged: Vec<ParamRef>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IsaTest {
    pub type_id: TypeId,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PresenceTest {
    pub name: String,
    pub negated: bool,
    pub binding: Binding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockKind {
    pub concurrent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RedirectKind {
    Continue,
    Redirect,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum UnaryOperator {
    Negate,
    BitFlip,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LogicalAnd,
    LogicalOr,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    EqualIgnoreCase,
    NotEqualIgnoreCase,
    LessThanIgnoreCase,
    LessThanEqualIgnoreCase,
    GreaterThanIgnoreCase,
    GreaterThanEqualIgnoreCase,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        use BinaryOperator as BO;
        match self {
            BO::Add => "+",
            BO::Subtract => "-",
            BO::Multiply => "*",
            BO::Divide => "/",
            BO::Modulo => "%",
            BO::Power => "**",
            BO::ShiftLeft => "<<",
            BO::ShiftRight => ">>",
            BO::UnsignedShiftRight => ">>>",
            BO::BitwiseAnd => "&",
            BO::BitwiseOr => "|",
            BO::BitwiseXor => "^",
            BO::LogicalAnd => "&&",
            BO::LogicalOr => "||",
            BO::Equal => "==",
            BO::NotEqual => "!=",
            BO::LessThan => "<",
            BO::LessThanEqual => "<=",
            BO::GreaterThan => ">",
            BO::GreaterThanEqual => ">=",
            BO::EqualIgnoreCase => "~=",
            BO::NotEqualIgnoreCase => "!~=",
            BO::LessThanIgnoreCase => "~<",
            BO::LessThanEqualIgnoreCase => "~<=",
            BO::GreaterThanIgnoreCase => "~>",
            BO::GreaterThanEqualIgnoreCase => "~>=",
        }
    }

    pub fn is_relational(&self) -> bool {
        use BinaryOperator as BO;
        match self {
            BO::Equal | BO::NotEqual | BO::LessThan | BO::LessThanEqual |
            BO::GreaterThan | BO::GreaterThanEqual |
            BO::EqualIgnoreCase | BO::NotEqualIgnoreCase | BO::LessThanIgnoreCase |
            BO::LessThanEqualIgnoreCase | BO::GreaterThanIgnoreCase |
            BO::GreaterThanEqualIgnoreCase => true,
            _ => false,
        }
    }

    pub fn is_logical(&self) -> bool {
        *self == BinaryOperator::LogicalAnd || *self == BinaryOperator::LogicalOr
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::BitFlip => "~",
            UnaryOperator::LogicalNot => "!",
        })
    }
}

//------------------------------------------------------------------------------
// Definitions
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Access {
    Public,
    /// Visible from anywhere inside the same site
    Site,
    /// Visible only from within the owner of the definition
    Local,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display,
    serde::Serialize, serde::Deserialize,
)]
pub enum Durability {
    #[display(fmt = "static")]
    Static,
    #[display(fmt = "dynamic")]
    Dynamic,
    #[display(fmt = "contextual")]
    Contextual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CollectionCategory {
    Array,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DefinitionCategory {
    Value,
    Collection(CollectionCategory),
    Site,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Parameter {
    pub name: String,
    // Invalid means the default type
    pub type_id: TypeId,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ParameterList {
    pub params: Vec<Parameter>,
}

impl ParameterList {
    pub fn len(&self) -> usize {
        self.params.len()
    }
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
    /// True if both lists have the same length and spell out the same type
    /// at every position. Such lists cannot be told apart by a call.
    pub fn same_shape(&self, heap: &Heap, other: &ParameterList) -> bool {
        self.len() == other.len()
            && self.params.iter().zip(&other.params).all(|(a, b)| same_type_spelling(heap, a.type_id, b.type_id))
    }
    pub fn find(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Keep {
    pub name: String,
    // Phase 2: resolver
    pub target: Option<DefinitionId>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Definition {
    pub this: DefinitionId,
    pub position: InputPosition,
    pub name: String,
    pub full_name: String,
    pub owner: DefinitionId,
    pub access: Access,
    pub durability: Durability,
    pub category: DefinitionCategory,
    // Invalid means the default type
    pub declared_type: TypeId,
    // Invalid means there is no super type
    pub super_type: TypeId,
    // Always at least one (possibly empty) parameter list
    pub signatures: Vec<ParameterList>,
    // Invalid for abstract definitions
    pub body: NodeId,
    pub children: Vec<DefinitionId>,
    pub keeps: Vec<Keep>,
}

// Compared as written, the table is built before any type is resolved
fn same_type_spelling(heap: &Heap, a: TypeId, b: TypeId) -> bool {
    match (a.is_invalid(), b.is_invalid()) {
        (true, true) => true,
        (false, false) => {
            let (a, b) = (&heap.types[a], &heap.types[b]);
            a.name == b.name
                && a.dims.len() == b.dims.len()
                && a.dims.iter().zip(&b.dims).all(|(x, y)| x.category == y.category)
        },
        _ => false,
    }
}

impl Definition {
    pub fn is_abstract(&self) -> bool {
        self.body.is_invalid()
    }
    pub fn is_site(&self) -> bool {
        self.category == DefinitionCategory::Site
    }
    pub fn collection_category(&self) -> Option<CollectionCategory> {
        match self.category {
            DefinitionCategory::Collection(category) => Some(category),
            _ => None,
        }
    }
    pub fn accepts_arity(&self, num_args: usize) -> Option<usize> {
        self.signatures.iter().position(|s| s.len() == num_args)
    }
}

//------------------------------------------------------------------------------
// Types
//------------------------------------------------------------------------------

/// Kinds of primitive values. The declaration order is the promotion order
/// used by the binary operators, `Collection` sits outside of that order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display,
    serde::Serialize, serde::Deserialize,
)]
pub enum ValueKind {
    #[display(fmt = "void")]
    Void,
    #[display(fmt = "boolean")]
    Boolean,
    #[display(fmt = "byte")]
    Byte,
    #[display(fmt = "int")]
    Int,
    #[display(fmt = "long")]
    Long,
    #[display(fmt = "double")]
    Double,
    #[display(fmt = "char")]
    Char,
    #[display(fmt = "string")]
    String,
    #[display(fmt = "collection")]
    Collection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeTarget {
    Unresolved,
    Default,
    Unknown,
    Primitive(ValueKind),
    Definition(DefinitionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Bound {
    Unresolved,
    Open,
    Fixed(usize),
    Keyed(ValueKind),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Dimension {
    pub category: CollectionCategory,
    // Invalid for open dimensions
    pub bound_expr: NodeId,
    // Phase 2: resolver
    pub bound: Bound,
}

/// A structural type descriptor as written in the source: a name with an
/// optional list of dimensions. The resolver links it to its target and to the
/// super type of that target.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Type {
    pub this: TypeId,
    pub position: InputPosition,
    pub name: String,
    pub dims: Vec<Dimension>,
    // Phase 2: resolver
    pub target: TypeTarget,
    pub super_type: TypeTarget,
}

impl Type {
    pub fn is_collection(&self) -> bool {
        !self.dims.is_empty()
    }
}
