//! In-memory relational store.
//!
//! The store holds two append-only collections, owners and pets. Pets reference
//! their owner through `owner_id`; the reference is not enforced, a pet may point
//! to an owner that does not exist.

use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// A pet owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: i64,
    pub name: String,
}

/// A pet, owned by the owner identified by `owner_id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
}

/// A row of a [`Collection`].
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> i64;
}

impl Record for Owner {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Record for Pet {
    fn id(&self) -> i64 {
        self.id
    }
}

/// Any entity held by the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    Owner(Owner),
    Pet(Pet),
}

impl Entity {
    /// The name of the GraphQL object type this entity resolves as.
    pub fn type_name(&self) -> &'static str {
        match self {
            Entity::Owner(_) => "Owner",
            Entity::Pet(_) => "Pet",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Entity::Owner(owner) => owner.id,
            Entity::Pet(pet) => pet.id,
        }
    }

    pub fn as_owner(&self) -> Option<&Owner> {
        match self {
            Entity::Owner(owner) => Some(owner),
            Entity::Pet(_) => None,
        }
    }

    pub fn as_pet(&self) -> Option<&Pet> {
        match self {
            Entity::Pet(pet) => Some(pet),
            Entity::Owner(_) => None,
        }
    }
}

impl From<Owner> for Entity {
    fn from(owner: Owner) -> Self {
        Entity::Owner(owner)
    }
}

impl From<Pet> for Entity {
    fn from(pet: Pet) -> Self {
        Entity::Pet(pet)
    }
}

/// How [`Collection::insert`] picks the identifier of a new row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdAllocation {
    /// The number of rows plus one.
    ///
    /// Collections are append-only so this matches the highest id as long as rows
    /// were inserted in id order. It hands out a duplicate id otherwise.
    #[default]
    Count,

    /// The highest id in the collection plus one.
    Max,
}

impl IdAllocation {
    fn next_id<T: Record>(self, rows: &[T]) -> i64 {
        match self {
            IdAllocation::Count => rows.len() as i64 + 1,
            IdAllocation::Max => rows.iter().map(Record::id).max().unwrap_or(0) + 1,
        }
    }
}

/// An append-only collection of rows.
///
/// Readers take a shared lock, [`Collection::insert`] takes the exclusive lock for
/// both the id computation and the push, so a new row is either fully visible or
/// not visible at all.
#[derive(Debug)]
pub struct Collection<T> {
    name: &'static str,
    id_allocation: IdAllocation,
    rows: RwLock<Vec<T>>,
}

impl<T: Record> Collection<T> {
    pub fn new(name: &'static str, id_allocation: IdAllocation) -> Self {
        Self::with_rows(name, id_allocation, Vec::new())
    }

    pub fn with_rows(name: &'static str, id_allocation: IdAllocation, rows: Vec<T>) -> Self {
        Self {
            name,
            id_allocation,
            rows: RwLock::new(rows),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Linear search by identifier.
    pub fn find_by_id(&self, id: i64) -> Option<T> {
        self.rows.read().iter().find(|row| row.id() == id).cloned()
    }

    /// Every row, in insertion order.
    pub fn scan_all(&self) -> Vec<T> {
        self.rows.read().clone()
    }

    /// Every row matching `predicate`, in insertion order.
    pub fn find_where(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .read()
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    /// Appends the row built by `build` from the next identifier, and returns it.
    pub fn insert(&self, build: impl FnOnce(i64) -> T) -> T {
        let mut rows = self.rows.write();
        let id = self.id_allocation.next_id(&rows);
        let row = build(id);
        rows.push(row.clone());
        tracing::debug!(collection = self.name, id, "inserted row");
        row
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

/// The relational store: owners and pets.
#[derive(Debug)]
pub struct Store {
    owners: Collection<Owner>,
    pets: Collection<Pet>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// An empty store using the default id allocation.
    pub fn new() -> Self {
        Self::with_id_allocation(IdAllocation::default())
    }

    pub fn with_id_allocation(id_allocation: IdAllocation) -> Self {
        Self::from_rows(id_allocation, Vec::new(), Vec::new())
    }

    /// A store holding the sample owners and pets.
    pub fn seeded() -> Self {
        Self::seeded_with(IdAllocation::default())
    }

    pub fn seeded_with(id_allocation: IdAllocation) -> Self {
        Self::from_rows(id_allocation, seed_owners(), seed_pets())
    }

    pub fn from_rows(id_allocation: IdAllocation, owners: Vec<Owner>, pets: Vec<Pet>) -> Self {
        Self {
            owners: Collection::with_rows("owners", id_allocation, owners),
            pets: Collection::with_rows("pets", id_allocation, pets),
        }
    }

    pub fn owners(&self) -> &Collection<Owner> {
        &self.owners
    }

    pub fn pets(&self) -> &Collection<Pet> {
        &self.pets
    }
}

fn seed_owners() -> Vec<Owner> {
    [
        (1, "Joey Calamad"),
        (2, "Johnny Basanagol"),
        (3, "Vinny Gabagool"),
        (4, "Bob"),
    ]
    .into_iter()
    .map(|(id, name)| Owner {
        id,
        name: name.to_string(),
    })
    .collect()
}

fn seed_pets() -> Vec<Pet> {
    [
        (1, "Groucho Barks", 1),
        (2, "Bark Twain", 4),
        (3, "Kanye Westie", 1),
        (4, "Mary Puppins", 2),
        (5, "Jimmy Chew", 4),
        (6, "Snoop Dog", 3),
        (7, "Dogzilla", 3),
        (8, "Pup Tart", 4),
        (9, "Chew-barka", 3),
        (10, "Meatball", 1),
    ]
    .into_iter()
    .map(|(id, name, owner_id)| Pet {
        id,
        name: name.to_string(),
        owner_id,
    })
    .collect()
}
