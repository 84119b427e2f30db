use std::sync::Arc;

use lazy_static::lazy_static;

use super::ast::*;
use super::eval::collection::{CollectionFlavor, CollectionInstance, Element};
use super::eval::error::{EvalError, EvalErrorKind};
use super::eval::operators::coerce;
use super::eval::value::Value;

// Longest super type chain that is followed before it is considered cyclic
const MAX_CHAIN_LENGTH: usize = 64;

fn sentinel_type(name: &str, target: TypeTarget) -> Type {
    Type {
        this: TypeId::new_invalid(),
        position: InputPosition::default(),
        name: name.to_string(),
        dims: Vec::new(),
        target,
        super_type: TypeTarget::Unknown,
    }
}

lazy_static! {
    /// Type of everything declared without a type. Converts by identity.
    pub static ref DEFAULT_TYPE: Type = sentinel_type("", TypeTarget::Default);
    /// Type whose resolution failed or was deferred. Converts by identity.
    pub static ref UNKNOWN_TYPE: Type = sentinel_type("?", TypeTarget::Unknown);
}

impl Type {
    pub fn is_sentinel(&self) -> bool {
        match self.target {
            TypeTarget::Default | TypeTarget::Unknown => !self.is_collection(),
            _ => false,
        }
    }
}

impl Heap {
    /// Returns the type behind `id`, the default type for an invalid id and
    /// the unknown type for a type whose name never resolved.
    pub fn type_ref(&self, id: TypeId) -> &Type {
        if id.is_invalid() {
            return &DEFAULT_TYPE;
        }
        let ty = &self.types[id];
        match ty.target {
            TypeTarget::Unresolved | TypeTarget::Unknown if !ty.is_collection() => &UNKNOWN_TYPE,
            _ => ty,
        }
    }

    /// Definition a type refers to, if any.
    pub fn type_definition(&self, id: TypeId) -> Option<DefinitionId> {
        match self.type_ref(id).target {
            TypeTarget::Definition(def) => Some(def),
            _ => None,
        }
    }

    /// True if `def` is `ancestor` or inherits from it through its super type
    /// chain.
    pub fn is_subdefinition(&self, def: DefinitionId, ancestor: DefinitionId) -> bool {
        let mut current = def;
        for _ in 0..MAX_CHAIN_LENGTH {
            if current == ancestor {
                return true;
            }
            match self.type_definition(self[current].super_type) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// Structural membership test of a value against a type, as used by the
    /// "isa" test when the subject is not a definition.
    pub fn is_instance(&self, value: &Value, type_id: TypeId) -> bool {
        self.is_instance_with_depth(value, type_id, 0)
    }

    fn is_instance_with_depth(&self, value: &Value, type_id: TypeId, depth: usize) -> bool {
        let ty = self.type_ref(type_id);
        if let Some(dim) = ty.dims.first() {
            let collection = match value {
                Value::Collection(collection) => collection,
                _ => return false,
            };
            return match (dim.category, dim.bound) {
                (CollectionCategory::Table, _) => collection.is_table(),
                (CollectionCategory::Array, Bound::Fixed(size)) => {
                    !collection.is_table() && collection.len() == size
                },
                (CollectionCategory::Array, _) => !collection.is_table(),
            };
        }
        match ty.target {
            TypeTarget::Default => true,
            TypeTarget::Unknown | TypeTarget::Unresolved => false,
            TypeTarget::Primitive(kind) => value.kind() == kind,
            TypeTarget::Definition(def) => {
                // A value is an instance of a definition if it fits the type
                // that definition declares
                let declared = self[def].declared_type;
                depth < MAX_CHAIN_LENGTH
                    && !self.type_ref(declared).is_sentinel()
                    && self.is_instance_with_depth(value, declared, depth + 1)
            },
        }
    }

    /// Converts `value` to the representation of the type behind `type_id`.
    /// Sentinel types convert by identity.
    pub fn convert(&self, value: Value, type_id: TypeId) -> Result<Value, EvalError> {
        self.convert_with_depth(value, type_id, 0)
    }

    fn convert_with_depth(&self, value: Value, type_id: TypeId, depth: usize) -> Result<Value, EvalError> {
        let ty = self.type_ref(type_id);
        if ty.is_sentinel() {
            return Ok(value);
        }
        if depth > MAX_CHAIN_LENGTH {
            return Err(EvalError::new(
                EvalErrorKind::RecursionLimit,
                format!("type '{}' refers to itself", ty.name),
            ));
        }

        if let Some(dim) = ty.dims.first() {
            return convert_to_collection(value, dim, &ty.name);
        }

        match ty.target {
            TypeTarget::Primitive(kind) => coerce(&value, kind),
            TypeTarget::Definition(def) => {
                self.convert_with_depth(value, self[def].declared_type, depth + 1)
            },
            _ => Ok(value),
        }
    }
}

fn convert_to_collection(value: Value, dim: &Dimension, type_name: &str) -> Result<Value, EvalError> {
    let collection = match value {
        Value::Collection(collection) => collection,
        // An absent value becomes an empty collection of the right flavor
        Value::Void => {
            let flavor = match (dim.category, dim.bound) {
                (CollectionCategory::Table, _) => CollectionFlavor::Table,
                (CollectionCategory::Array, Bound::Fixed(size)) => CollectionFlavor::FixedArray(size),
                _ => CollectionFlavor::GrowableArray,
            };
            return Ok(Value::Collection(Arc::new(CollectionInstance::new(flavor))));
        },
        scalar => {
            return Err(EvalError::unsupported(format!(
                "cannot convert '{}' to collection type '{}'", scalar, type_name
            )));
        },
    };

    match (dim.category, collection.is_table()) {
        (CollectionCategory::Table, true) => Ok(Value::Collection(collection)),
        (CollectionCategory::Array, false) => match dim.bound {
            Bound::Fixed(size) if collection.flavor() != CollectionFlavor::FixedArray(size) => {
                let elements: Vec<Element> = collection.entries().into_iter().map(|(_, e)| e).collect();
                let fixed = CollectionInstance::array(CollectionFlavor::FixedArray(size), elements)?;
                Ok(Value::Collection(Arc::new(fixed)))
            },
            _ => Ok(Value::Collection(collection)),
        },
        (CollectionCategory::Table, false) => Err(EvalError::new(
            EvalErrorKind::TableReference,
            format!("an array cannot be converted to table type '{}'", type_name),
        )),
        (CollectionCategory::Array, true) => Err(EvalError::new(
            EvalErrorKind::ArrayReference,
            format!("a table cannot be converted to array type '{}'", type_name),
        )),
    }
}
