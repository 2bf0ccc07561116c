//! Containers backing collection declarations.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::instance::Instance;
use crate::subject::Subject;

/// Container kind of a collection declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Ordered sequence; elements are appended.
    #[default]
    Sequence,
    /// Name-keyed mapping; elements are inserted under a key.
    Mapping,
}

/// Where an add operation put its element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    collection: String,
    position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Index(usize),
    Key(String),
}

impl Slot {
    pub(crate) fn index(collection: impl Into<String>, index: usize) -> Self {
        Self {
            collection: collection.into(),
            position: Position::Index(index),
        }
    }

    pub(crate) fn key(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            position: Position::Key(key.into()),
        }
    }

    /// Attribute key of the backing container.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Sequence index, for sequence collections.
    pub fn as_index(&self) -> Option<usize> {
        match self.position {
            Position::Index(index) => Some(index),
            Position::Key(_) => None,
        }
    }

    /// Mapping key, for mapping collections.
    pub fn as_key(&self) -> Option<&str> {
        match &self.position {
            Position::Key(key) => Some(key),
            Position::Index(_) => None,
        }
    }
}

/// Child instances held by a collection declaration.
pub enum Collection<C: Subject> {
    Sequence(Vec<Instance<C>>),
    Mapping(FxHashMap<String, Instance<C>>),
}

impl<C: Subject> Collection<C> {
    /// Creates an empty container of the given kind.
    pub fn new(kind: CollectionKind) -> Self {
        match kind {
            CollectionKind::Sequence => Collection::Sequence(Vec::new()),
            CollectionKind::Mapping => Collection::Mapping(FxHashMap::default()),
        }
    }

    pub fn kind(&self) -> CollectionKind {
        match self {
            Collection::Sequence(_) => CollectionKind::Sequence,
            Collection::Mapping(_) => CollectionKind::Mapping,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Collection::Sequence(items) => items.len(),
            Collection::Mapping(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the elements in insertion order, for sequences.
    pub fn as_slice(&self) -> Option<&[Instance<C>]> {
        match self {
            Collection::Sequence(items) => Some(items),
            Collection::Mapping(_) => None,
        }
    }

    /// Returns the keyed elements, for mappings.
    pub fn as_map(&self) -> Option<&FxHashMap<String, Instance<C>>> {
        match self {
            Collection::Mapping(items) => Some(items),
            Collection::Sequence(_) => None,
        }
    }

    /// Returns the element at `index` of a sequence.
    pub fn get_index(&self, index: usize) -> Option<&Instance<C>> {
        self.as_slice()?.get(index)
    }

    /// Returns the element under `key` of a mapping.
    pub fn get(&self, key: &str) -> Option<&Instance<C>> {
        self.as_map()?.get(key)
    }

    /// Returns the element `slot` points at.
    pub fn at(&self, slot: &Slot) -> Option<&Instance<C>> {
        match &slot.position {
            Position::Index(index) => self.get_index(*index),
            Position::Key(key) => self.get(key),
        }
    }

    /// Mutable variant of [`Collection::at`].
    pub fn at_mut(&mut self, slot: &Slot) -> Option<&mut Instance<C>> {
        match (self, &slot.position) {
            (Collection::Sequence(items), Position::Index(index)) => items.get_mut(*index),
            (Collection::Mapping(items), Position::Key(key)) => items.get_mut(key),
            _ => None,
        }
    }

    /// Adds an element: appended for sequences, inserted under `key` for
    /// mappings (replacing any previous element under that key).
    ///
    /// Returns `None` if this is a mapping and `key` is missing or empty.
    pub(crate) fn insert(
        &mut self,
        name: &str,
        key: Option<String>,
        element: Instance<C>,
    ) -> Option<Slot> {
        match self {
            Collection::Sequence(items) => {
                items.push(element);
                Some(Slot::index(name, items.len() - 1))
            }
            Collection::Mapping(items) => {
                let key = key.filter(|key| !key.is_empty())?;
                items.insert(key.clone(), element);
                Some(Slot::key(name, key))
            }
        }
    }
}

impl<C: Subject + fmt::Debug> fmt::Debug for Collection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Sequence(items) => f.debug_list().entries(items).finish(),
            Collection::Mapping(items) => f.debug_map().entries(items).finish(),
        }
    }
}
