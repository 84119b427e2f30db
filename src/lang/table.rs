use std::collections::HashMap;

use super::ast::*;
use super::eval::error::{EvalError, EvalErrorKind};
use super::eval::value::Value;

/// Index of all definitions of a domain by qualified name. Overloads of one
/// name live side by side and must differ in the arity or the parameter
/// types of their signatures.
#[derive(Debug, Default, Clone)]
pub struct DefinitionTable {
    by_name: HashMap<String, Vec<DefinitionId>>,
}

/// Outcome of a successful `add_definition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    New,
    Replaced(DefinitionId),
}

fn signatures_collide(heap: &Heap, a: DefinitionId, b: DefinitionId) -> bool {
    heap[a].signatures.iter().any(|sa| heap[b].signatures.iter().any(|sb| sa.same_shape(heap, sb)))
}

impl DefinitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every definition in the heap, failing on the first signature
    /// collision.
    pub fn build(heap: &Heap) -> Result<Self, EvalError> {
        let mut table = DefinitionTable::new();
        let mut pending: Vec<DefinitionId> = heap.roots().iter().rev().copied().collect();
        while let Some(def) = pending.pop() {
            table.add_definition(heap, def, false)?;
            pending.extend(heap[def].children.iter().rev().copied());
        }
        Ok(table)
    }

    /// Number of definitions in the table.
    pub fn len(&self) -> usize {
        self.by_name.values().map(|ids| ids.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds `def` under its qualified name. A definition with the same name
    /// and a colliding signature is an error unless `replace` is set, in which
    /// case it is swapped out in place. On error the table is unchanged.
    pub fn add_definition(&mut self, heap: &Heap, def: DefinitionId, replace: bool) -> Result<Added, EvalError> {
        let full_name = &heap[def].full_name;
        let overloads = self.by_name.entry(full_name.clone()).or_insert_with(Vec::new);

        let colliding = overloads.iter().position(|&existing| {
            existing != def && signatures_collide(heap, existing, def)
        });
        match colliding {
            None => {
                if !overloads.contains(&def) {
                    overloads.push(def);
                }
                Ok(Added::New)
            },
            Some(_) if !replace => {
                Err(EvalError::new(
                    EvalErrorKind::DuplicateDefinition,
                    format!("'{}' is already defined with the same signature", full_name),
                ).with_position(heap[def].position))
            },
            Some(position) => {
                let replaced = overloads[position];
                overloads[position] = def;
                Ok(Added::Replaced(replaced))
            },
        }
    }

    /// All overloads registered under a qualified name.
    pub fn lookup_all(&self, full_name: &str) -> &[DefinitionId] {
        self.by_name.get(full_name).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    pub fn lookup(&self, full_name: &str) -> Option<DefinitionId> {
        self.lookup_all(full_name).first().copied()
    }

    /// Resolves `name` as seen from inside `from`. Scopes are tried in order:
    /// children of the owner chain (local), names relative to the enclosing
    /// sites, and finally fully qualified (external) names. With `arity`
    /// set, only an overload accepting that many arguments matches.
    pub fn lookup_scoped(
        &self, heap: &Heap, from: DefinitionId, name: &str, arity: Option<usize>,
    ) -> Option<DefinitionId> {
        if !from.is_invalid() {
            // local
            for owner in heap.owner_chain(from) {
                let full_name = format!("{}.{}", heap[owner].full_name, name);
                let found = self.select(heap, &full_name, arity, |def| heap[def].owner == owner);
                if found.is_some() {
                    return found;
                }
            }
            // site-prefixed
            for site in heap.owner_chain(from).filter(|&d| heap[d].is_site()) {
                let full_name = format!("{}.{}", heap[site].full_name, name);
                let found = self.select(heap, &full_name, arity, |def| is_visible(heap, from, def));
                if found.is_some() {
                    return found;
                }
            }
        }
        // external
        self.select(heap, name, arity, |def| {
            if from.is_invalid() {
                heap[def].access == Access::Public
            } else {
                is_visible(heap, from, def)
            }
        })
    }

    /// Picks, among the overloads sharing the name of `def`, the signature
    /// that fits the argument values best. A signature fits if every value
    /// is an instance of its parameter type, and among fitting signatures the
    /// one with the most typed parameters wins. Without any fit the first
    /// signature of the right arity is used, its arguments get converted.
    pub fn select_overload(
        &self, heap: &Heap, def: DefinitionId, args: &[Value],
    ) -> Option<(DefinitionId, usize)> {
        let others = self.lookup_all(&heap[def].full_name).iter().copied().filter(|&other| other != def);
        let candidates: Vec<DefinitionId> = std::iter::once(def).chain(others).collect();

        let mut best: Option<(usize, DefinitionId, usize)> = None;
        for &candidate in &candidates {
            for (signature, list) in heap[candidate].signatures.iter().enumerate() {
                if list.len() != args.len() {
                    continue;
                }
                let fits = list.params.iter().zip(args).all(|(p, arg)| heap.is_instance(arg, p.type_id));
                if !fits {
                    continue;
                }
                let num_typed = list.params.iter().filter(|p| !heap.type_ref(p.type_id).is_sentinel()).count();
                if best.map(|(score, _, _)| num_typed > score).unwrap_or(true) {
                    best = Some((num_typed, candidate, signature));
                }
            }
        }
        if let Some((_, candidate, signature)) = best {
            return Some((candidate, signature));
        }

        candidates.into_iter().find_map(|candidate| {
            heap[candidate].accepts_arity(args.len()).map(|signature| (candidate, signature))
        })
    }

    fn select<F: Fn(DefinitionId) -> bool>(
        &self, heap: &Heap, full_name: &str, arity: Option<usize>, visible: F,
    ) -> Option<DefinitionId> {
        self.lookup_all(full_name).iter().copied().find(|&def| {
            visible(def) && arity.map(|n| heap[def].accepts_arity(n).is_some()).unwrap_or(true)
        })
    }
}

/// Access rules: public definitions are visible everywhere, site definitions
/// within the same outermost site, local definitions only inside their owner.
fn is_visible(heap: &Heap, from: DefinitionId, def: DefinitionId) -> bool {
    match heap[def].access {
        Access::Public => true,
        Access::Site => heap.root_of(from) == heap.root_of(def),
        Access::Local => {
            let owner = heap[def].owner;
            owner.is_invalid() || heap.is_within(from, owner)
        },
    }
}
