// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory pet storage

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

/// A stored pet
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pet {
    /// Store assigned identifier
    pub id: u64,
    /// Pet name
    pub name: String,
    /// Species, lowercase
    pub species: String,
    /// Day of birth, when known
    pub birth_date: Option<NaiveDate>,
    /// Free form tag
    pub tag: Option<String>,
}

/// Body of `POST /pets`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewPet {
    /// Pet name
    pub name: String,
    /// Species
    pub species: String,
    /// Day of birth, when known
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    /// Free form tag
    #[serde(default)]
    pub tag: Option<String>,
}

/// Criteria of `POST /pets/search`, all optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub struct PetFilter {
    /// Exact species, case insensitive
    #[serde(default)]
    pub species: Option<String>,
    /// Substring of the name, case insensitive
    #[serde(default)]
    pub name: Option<String>,
    /// Only pets born on or after this day
    #[serde(default, rename = "born-after")]
    pub born_after: Option<NaiveDate>,
}

impl PetFilter {
    fn matches(&self, pet: &Pet) -> bool {
        if let Some(species) = &self.species
            && !pet.species.eq_ignore_ascii_case(species)
        {
            return false;
        }
        if let Some(name) = &self.name
            && !pet.name.to_lowercase().contains(&name.to_lowercase())
        {
            return false;
        }
        if let Some(born_after) = self.born_after {
            return pet.birth_date.is_some_and(|born| born >= born_after);
        }
        true
    }
}

/// Concurrent pet storage keyed by id
#[derive(Debug)]
pub struct PetStore {
    pets: DashMap<u64, Pet>,
    next_id: AtomicU64,
}

impl Default for PetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PetStore {
    /// Empty store; ids start at 1
    pub fn new() -> Self {
        Self {
            pets: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a new pet under a fresh id
    pub fn insert(&self, pet: NewPet) -> Pet {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pet = Pet {
            id,
            name: pet.name,
            species: pet.species.to_lowercase(),
            birth_date: pet.birth_date,
            tag: pet.tag,
        };
        self.pets.insert(id, pet.clone());
        pet
    }

    /// Pet with `id`
    pub fn get(&self, id: u64) -> Option<Pet> {
        self.pets.get(&id).map(|entry| entry.value().clone())
    }

    /// Remove and return the pet with `id`
    pub fn remove(&self, id: u64) -> Option<Pet> {
        self.pets.remove(&id).map(|(_, pet)| pet)
    }

    /// Up to `limit` pets ordered by id
    pub fn list(&self, limit: Option<usize>) -> Vec<Pet> {
        self.search(&PetFilter::default(), limit)
    }

    /// Pets matching `filter`, ordered by id
    pub fn search(&self, filter: &PetFilter, limit: Option<usize>) -> Vec<Pet> {
        let mut pets: Vec<Pet> = self
            .pets
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        pets.sort_by_key(|pet| pet.id);
        pets.truncate(limit.unwrap_or(usize::MAX));
        pets
    }

    /// Number of stored pets
    pub fn len(&self) -> usize {
        self.pets.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.pets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_pet(name: &str, species: &str, born: Option<&str>) -> NewPet {
        NewPet {
            name: name.to_string(),
            species: species.to_string(),
            birth_date: born.map(|day| day.parse().unwrap()),
            tag: None,
        }
    }

    fn seeded() -> PetStore {
        let store = PetStore::new();
        store.insert(new_pet("Rex", "Dog", Some("2019-04-01")));
        store.insert(new_pet("Tom", "cat", Some("2021-06-15")));
        store.insert(new_pet("Felix", "cat", None));
        store
    }

    #[test]
    fn assigns_increasing_ids() {
        let store = seeded();
        let ids: Vec<u64> = store.list(None).iter().map(|pet| pet.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(store.get(1).unwrap().species, "dog");
    }

    #[test]
    fn list_respects_limit() {
        let store = seeded();
        assert_eq!(store.list(Some(2)).len(), 2);
        assert_eq!(store.list(Some(0)).len(), 0);
    }

    #[test]
    fn search_combines_criteria() {
        let store = seeded();

        let cats = PetFilter {
            species: Some("CAT".to_string()),
            ..PetFilter::default()
        };
        assert_eq!(store.search(&cats, None).len(), 2);

        let young_cats = PetFilter {
            born_after: Some("2020-01-01".parse().unwrap()),
            ..cats
        };
        let found = store.search(&young_cats, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Tom");

        let by_name = PetFilter {
            name: Some("eli".to_string()),
            ..PetFilter::default()
        };
        assert_eq!(store.search(&by_name, None)[0].name, "Felix");
    }

    #[test]
    fn remove_returns_the_pet_once() {
        let store = seeded();
        assert_eq!(store.remove(2).unwrap().name, "Tom");
        assert!(store.remove(2).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let store = PetStore::new();
        let pet = store.insert(new_pet("Felix", "cat", None));
        let value = serde_json::to_value(&pet).unwrap();
        assert!(value.get("birth_date").is_none());
        assert!(value.get("tag").is_none());
    }
}
