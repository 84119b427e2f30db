use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use indexmap::IndexMap;

use super::context::Context;
use super::engine::Engine;
use super::error::{EvalError, EvalErrorKind, Unwind};
use super::value::Value;
use crate::lang::ast::NodeId;

/// One slot of a collection. Elements that were not evaluated while the
/// collection was built keep a reference to their construction until they are
/// resolved against a context.
#[derive(Debug, Clone)]
pub enum Element {
    Value(Value),
    Construction(NodeId),
}

impl Element {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Element::Value(value) => Some(value),
            Element::Construction(_) => None,
        }
    }

    fn same_as(&self, other: &Element) -> bool {
        match (self, other) {
            (Element::Value(a), Element::Value(b)) => a == b,
            (Element::Construction(a), Element::Construction(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        Element::Value(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionFlavor {
    /// Array whose size is locked by a resolved dimension
    FixedArray(usize),
    GrowableArray,
    Table,
}

impl CollectionFlavor {
    pub fn is_table(&self) -> bool {
        *self == CollectionFlavor::Table
    }
}

/// Evaluated key addressing one element of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Index {
    Int(i64),
    Key(String),
}

impl Index {
    pub fn from_value(value: &Value) -> Result<Index, EvalError> {
        match value {
            Value::String(key) => Ok(Index::Key(key.to_string())),
            Value::Char(key) => Ok(Index::Key(key.to_string())),
            Value::Double(_) | Value::Void | Value::Collection(_) => Err(EvalError::usage(
                format!("a value of kind {} cannot be used as an index", value.kind()),
            )),
            other => match other.integral() {
                Some(index) => Ok(Index::Int(index)),
                None => Err(EvalError::usage(format!("'{}' is not a valid index", other))),
            },
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Int(index) => write!(f, "{}", index),
            Index::Key(key) => write!(f, "\"{}\"", key),
        }
    }
}

#[derive(Debug)]
enum Items {
    Array(Vec<Element>),
    Table(IndexMap<String, Element>),
}

/// A materialized array or table. The container is built eagerly, elements
/// may still be constructions that are bound to a context on first access.
pub struct CollectionInstance {
    flavor: CollectionFlavor,
    items: RwLock<Items>,
    // (frame key, index) -> resolved element
    resolved: Mutex<HashMap<(u64, Index), Value>>,
}

impl CollectionInstance {
    pub fn new(flavor: CollectionFlavor) -> Self {
        let items = match flavor {
            CollectionFlavor::FixedArray(size) => {
                Items::Array(vec![Element::Value(Value::Void); size])
            },
            CollectionFlavor::GrowableArray => Items::Array(Vec::new()),
            CollectionFlavor::Table => Items::Table(IndexMap::new()),
        };
        CollectionInstance { flavor, items: RwLock::new(items), resolved: Mutex::new(HashMap::new()) }
    }

    /// Builds an array of the given flavor from a list of elements. A fixed
    /// array is padded with void elements up to its bound, and a list longer
    /// than the bound is an array reference error.
    pub fn array(flavor: CollectionFlavor, elements: Vec<Element>) -> Result<Self, EvalError> {
        let items = match flavor {
            CollectionFlavor::FixedArray(size) => {
                if elements.len() > size {
                    return Err(EvalError::new(
                        EvalErrorKind::ArrayReference,
                        format!("{} elements do not fit into an array of size {}", elements.len(), size),
                    ));
                }
                let mut elements = elements;
                elements.resize(size, Element::Value(Value::Void));
                elements
            },
            CollectionFlavor::GrowableArray => elements,
            CollectionFlavor::Table => {
                return Err(EvalError::new(EvalErrorKind::Internal, "array items for a table"));
            },
        };
        Ok(CollectionInstance {
            flavor,
            items: RwLock::new(Items::Array(items)),
            resolved: Mutex::new(HashMap::new()),
        })
    }

    pub fn table(entries: IndexMap<String, Element>) -> Self {
        CollectionInstance {
            flavor: CollectionFlavor::Table,
            items: RwLock::new(Items::Table(entries)),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        let elements = values.into_iter().map(Element::Value).collect();
        CollectionInstance {
            flavor: CollectionFlavor::GrowableArray,
            items: RwLock::new(Items::Array(elements)),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn flavor(&self) -> CollectionFlavor {
        self.flavor
    }

    pub fn is_table(&self) -> bool {
        self.flavor.is_table()
    }

    pub fn len(&self) -> usize {
        match &*read(&self.items) {
            Items::Array(elements) => elements.len(),
            Items::Table(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current slots, keyed for tables.
    pub fn entries(&self) -> Vec<(Option<String>, Element)> {
        match &*read(&self.items) {
            Items::Array(elements) => elements.iter().map(|e| (None, e.clone())).collect(),
            Items::Table(entries) => {
                entries.iter().map(|(k, e)| (Some(k.clone()), e.clone())).collect()
            },
        }
    }

    pub fn indexes(&self) -> Vec<Index> {
        match &*read(&self.items) {
            Items::Array(elements) => (0..elements.len() as i64).map(Index::Int).collect(),
            Items::Table(entries) => entries.keys().cloned().map(Index::Key).collect(),
        }
    }

    pub fn same_elements(&self, other: &CollectionInstance) -> bool {
        if self.flavor.is_table() != other.flavor.is_table() {
            return false;
        }
        let lhs = self.entries();
        let rhs = other.entries();
        lhs.len() == rhs.len()
            && lhs.iter().zip(rhs.iter()).all(|((lk, le), (rk, re))| lk == rk && le.same_as(re))
    }

    /// Appends an element to a growable array.
    pub fn push(&self, element: Element) -> Result<(), EvalError> {
        if self.flavor != CollectionFlavor::GrowableArray {
            return Err(EvalError::new(
                EvalErrorKind::ArrayReference,
                "elements can only be appended to a growable array",
            ));
        }
        match &mut *write(&self.items) {
            Items::Array(elements) => elements.push(element),
            Items::Table(_) => unreachable!(),
        }
        Ok(())
    }

    pub fn insert(&self, key: String, element: Element) -> Result<(), EvalError> {
        match &mut *write(&self.items) {
            Items::Table(entries) => {
                entries.insert(key, element);
                Ok(())
            },
            Items::Array(_) => Err(EvalError::new(
                EvalErrorKind::ArrayReference,
                format!("cannot insert key \"{}\" into an array", key),
            )),
        }
    }

    /// Returns the slot at `index` without resolving it.
    pub fn get_element(&self, index: &Index) -> Result<Element, EvalError> {
        match (&*read(&self.items), index) {
            (Items::Array(elements), Index::Int(position)) => {
                if *position < 0 || *position as usize >= elements.len() {
                    return Err(EvalError::new(
                        EvalErrorKind::ArrayReference,
                        format!("index {} is out of bounds for an array of size {}", position, elements.len()),
                    ));
                }
                Ok(elements[*position as usize].clone())
            },
            (Items::Array(_), Index::Key(key)) => Err(EvalError::new(
                EvalErrorKind::ArrayReference,
                format!("key \"{}\" used to index an array", key),
            )),
            (Items::Table(entries), Index::Key(key)) => match entries.get(key) {
                Some(element) => Ok(element.clone()),
                None => Err(EvalError::new(
                    EvalErrorKind::TableReference,
                    format!("no entry for key \"{}\"", key),
                )),
            },
            (Items::Table(_), Index::Int(position)) => Err(EvalError::new(
                EvalErrorKind::TableReference,
                format!("integer index {} used to index a table", position),
            )),
        }
    }

    /// Binds the element at `index` to the current context. The result is
    /// memoized per frame, so repeated access within one frame returns the
    /// same value.
    pub(crate) fn get_resolved_element(
        &self, engine: &Engine, ctx: &mut Context, index: &Index,
    ) -> Result<Value, Unwind> {
        let node = match self.get_element(index)? {
            Element::Value(value) => return Ok(value),
            Element::Construction(node) => node,
        };

        let memo_key = (ctx.frame_key(), index.clone());
        if let Some(value) = lock(&self.resolved).get(&memo_key) {
            return Ok(value.clone());
        }

        // Evaluated without holding any lock, elements may refer back to this
        // very collection.
        let value = engine.eval_node(ctx, node)?;
        let value = lock(&self.resolved).entry(memo_key).or_insert(value).clone();
        Ok(value)
    }

    /// Resolves every pending element against `ctx` and stores the results in
    /// the collection itself. Used when a collection leaves the frame it was
    /// built in.
    pub(crate) fn materialize(&self, engine: &Engine, ctx: &mut Context) -> Result<(), Unwind> {
        for (position, index) in self.indexes().into_iter().enumerate() {
            if let Element::Value(Value::Collection(nested)) = self.get_element(&index)? {
                nested.materialize(engine, ctx)?;
                continue;
            }
            if self.get_element(&index)?.as_value().is_some() {
                continue;
            }
            let value = self.get_resolved_element(engine, ctx, &index)?;
            if let Value::Collection(nested) = &value {
                nested.materialize(engine, ctx)?;
            }
            match &mut *write(&self.items) {
                Items::Array(elements) => elements[position] = Element::Value(value),
                Items::Table(entries) => {
                    if let Some((_, element)) = entries.get_index_mut(position) {
                        *element = Element::Value(value);
                    }
                },
            }
        }
        Ok(())
    }

    /// Resolved values of all elements, in order.
    pub fn values(&self) -> Result<Vec<Value>, EvalError> {
        self.entries()
            .into_iter()
            .map(|(key, element)| match element {
                Element::Value(value) => Ok(value),
                Element::Construction(_) => Err(EvalError::new(
                    EvalErrorKind::UninitializedObject,
                    match key {
                        Some(key) => format!("table entry \"{}\" has not been resolved", key),
                        None => "array element has not been resolved".to_string(),
                    },
                )),
            })
            .collect()
    }

    /// Builds a new collection of the same shape with every resolved element
    /// passed through `f`.
    pub fn map_values<F>(&self, mut f: F) -> Result<CollectionInstance, EvalError>
    where
        F: FnMut(&Value) -> Result<Value, EvalError>,
    {
        let mut mapped = Vec::with_capacity(self.len());
        for (key, value) in self.entries().into_iter().map(|(key, _)| key).zip(self.values()?) {
            mapped.push((key, Element::Value(f(&value)?)));
        }
        Ok(match self.flavor {
            CollectionFlavor::Table => CollectionInstance::table(
                mapped.into_iter().map(|(key, e)| (key.unwrap_or_default(), e)).collect(),
            ),
            flavor => CollectionInstance::array(flavor, mapped.into_iter().map(|(_, e)| e).collect())?,
        })
    }

    /// Concatenation of two collections of the same category. Tables are
    /// merged, entries of `other` replace entries with the same key.
    pub fn concat(&self, other: &CollectionInstance) -> Result<CollectionInstance, EvalError> {
        match (self.is_table(), other.is_table()) {
            (true, true) => {
                let mut merged: IndexMap<String, Element> = IndexMap::new();
                for (key, element) in self.entries().into_iter().chain(other.entries()) {
                    merged.insert(key.unwrap_or_default(), element);
                }
                Ok(CollectionInstance::table(merged))
            },
            (false, false) => {
                let elements = self
                    .entries()
                    .into_iter()
                    .chain(other.entries())
                    .map(|(_, element)| element)
                    .collect();
                CollectionInstance::array(CollectionFlavor::GrowableArray, elements)
            },
            _ => Err(EvalError::unsupported("cannot concatenate an array and a table")),
        }
    }

    /// New growable array holding the elements of `self` followed by `value`.
    pub fn append(&self, value: Value) -> Result<CollectionInstance, EvalError> {
        if self.is_table() {
            return Err(EvalError::unsupported("cannot append a value to a table"));
        }
        let mut elements: Vec<Element> = self.entries().into_iter().map(|(_, e)| e).collect();
        elements.push(Element::Value(value));
        CollectionInstance::array(CollectionFlavor::GrowableArray, elements)
    }
}

impl fmt::Debug for CollectionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionInstance")
            .field("flavor", &self.flavor)
            .field("items", &*read(&self.items))
            .finish()
    }
}

impl From<Arc<CollectionInstance>> for Value {
    fn from(v: Arc<CollectionInstance>) -> Value {
        Value::Collection(v)
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock<T>(lock: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
