use core::hash::Hash;
use core::marker::PhantomData;

/// Stable index of an element living in an `Arena<T>`. Cross references in the
/// tree (parent, owner, bindings) are stored as ids, so no element ever owns
/// another element it points back to.
pub struct Id<T> {
    pub(crate) index: u32,
    _phantom: PhantomData<T>,
}
impl<T> Id<T> {
    pub(crate) fn new_invalid() -> Self {
        Self { index: u32::MAX, _phantom: PhantomData }
    }
    pub(crate) fn is_invalid(&self) -> bool {
        self.index == u32::MAX
    }
    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }
}
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Id<T> {}
impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index.eq(&other.index)
    }
}
impl<T> Eq for Id<T> {}
impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, h: &mut H) {
        self.index.hash(h);
    }
}
impl<T> serde::Serialize for Id<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.index)
    }
}
impl<'de, T> serde::Deserialize<'de> for Id<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let index = <u32 as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Self { index, _phantom: PhantomData })
    }
}
impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_invalid() {
            write!(f, "Id(-)")
        } else {
            write!(f, "Id({})", self.index)
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Arena<T> {
    store: Vec<T>,
}
impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { store: vec![] }
    }
    pub fn alloc_with_id(&mut self, f: impl FnOnce(Id<T>) -> T) -> Id<T> {
        use std::convert::TryFrom;
        // u32::MAX is reserved for the invalid id
        let index = u32::try_from(self.store.len())
            .ok()
            .filter(|index| *index != u32::MAX)
            .expect("Out of capacity!");
        let id = Id { index, _phantom: Default::default() };
        self.store.push(f(id));
        id
    }
    pub fn get(&self, id: Id<T>) -> Option<&T> {
        self.store.get(id.index())
    }
    pub fn len(&self) -> usize {
        self.store.len()
    }
    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        (0..).map(|index| Id { index, _phantom: Default::default() }).zip(self.store.iter())
    }
    pub fn ids(&self) -> impl Iterator<Item = Id<T>> {
        (0..self.store.len() as u32).map(|index| Id { index, _phantom: Default::default() })
    }
}
impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T> core::ops::Index<Id<T>> for Arena<T> {
    type Output = T;
    fn index(&self, id: Id<T>) -> &Self::Output {
        self.store.index(id.index as usize)
    }
}
impl<T> core::ops::IndexMut<Id<T>> for Arena<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut Self::Output {
        self.store.index_mut(id.index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Entry {
        this: Id<Entry>,
        label: &'static str,
    }

    #[test]
    fn test_ids_are_stable() {
        let mut arena = Arena::new();
        let first = arena.alloc_with_id(|this| Entry { this, label: "first" });
        let second = arena.alloc_with_id(|this| Entry { this, label: "second" });
        assert_ne!(first, second);
        assert_eq!(arena[first].this, first);
        assert_eq!(arena[second].label, "second");
        assert_eq!(arena.len(), 2);
        assert!(arena.get(Id::new_invalid()).is_none());
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![first, second]);
    }
}
