use crate::lang::ast::*;
use crate::lang::eval::operators::{apply_binary_operator, apply_unary_operator};
use crate::lang::eval::value::Value;
use crate::lang::table::DefinitionTable;

// Definitions followed while folding a single expression
const MAX_FOLD_DEPTH: usize = 16;

/// Evaluates an expression at resolution time, as needed for dimension
/// bounds. Only literals, operators, conditionals and references to
/// argument-less definitions whose bodies fold themselves are supported.
/// Anything else yields `None`.
pub(crate) fn fold(heap: &Heap, table: &DefinitionTable, owner: DefinitionId, node: NodeId) -> Option<Value> {
    fold_with_depth(heap, table, owner, node, 0)
}

fn fold_with_depth(
    heap: &Heap, table: &DefinitionTable, owner: DefinitionId, node: NodeId, depth: usize,
) -> Option<Value> {
    let fold_child = |index: usize| {
        let child = heap[node].get_child(index).ok()?;
        fold_with_depth(heap, table, owner, child, depth)
    };

    match &heap[node].kind {
        NodeKind::Literal(literal) => Some(Value::from_literal(literal)),
        NodeKind::Text(text) => Some(Value::string(text)),
        NodeKind::Unary(op) => apply_unary_operator(*op, &fold_child(0)?).ok(),
        NodeKind::Chain(ops) => {
            let mut result = fold_child(0)?;
            for (index, op) in ops.iter().enumerate() {
                let rhs = fold_child(index + 1)?;
                result = apply_binary_operator(&result, *op, &rhs).ok()?;
            }
            Some(result)
        },
        NodeKind::Conditional => {
            if fold_child(0)?.is_truthy() {
                fold_child(1)
            } else if heap[node].num_children() > 2 {
                fold_child(2)
            } else {
                Some(Value::Void)
            }
        },
        NodeKind::Name(name) => {
            if heap[node].num_children() != 0 || depth >= MAX_FOLD_DEPTH {
                return None;
            }
            let def = table.lookup_scoped(heap, owner, &name.name, Some(0))?;
            if heap[def].is_abstract() {
                return None;
            }
            fold_with_depth(heap, table, def, heap[def].body, depth + 1)
        },
        _ => None,
    }
}
