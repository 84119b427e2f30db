//! Static binding pass, run once after the tree has been built and again
//! whenever definitions are added. Every step recomputes its results from
//! the tree and the definition table and overwrites what a previous pass
//! stored, so running it twice leaves the heap unchanged.

mod binding;
pub(crate) mod constant;
pub(crate) mod visitor;

pub use binding::UnresolvedName;

use binding::BindingVisitor;
use visitor::{Ctx, Visitor};

use super::ast::Heap;
use super::table::DefinitionTable;

/// Outcome of a resolver pass. Unresolved names do not abort the pass, they
/// are bound to the unknown sentinel and listed here.
#[derive(Debug, Clone, Default)]
pub struct ResolveSummary {
    pub num_bound: usize,
    pub unresolved: Vec<UnresolvedName>,
}

impl ResolveSummary {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

pub fn resolve(heap: &mut Heap, table: &DefinitionTable) -> ResolveSummary {
    let mut visitor = BindingVisitor::new();
    let mut ctx = Ctx { heap, table };
    visitor.visit_heap(&mut ctx);
    ResolveSummary { num_bound: visitor.num_bound, unresolved: visitor.unresolved }
}
