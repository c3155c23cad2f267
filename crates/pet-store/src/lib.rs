// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Pet store
//!
//! A small service exercising the `rest` framework end to end: JSON, form and
//! HTML operations, a regex validated path parameter, bearer token protected
//! deletes and problem details for missing pets.

pub mod auth;
pub mod error;
pub mod service;
pub mod store;

pub use auth::{Caller, Claims, JwtKeys};
pub use error::PetNotFound;
pub use service::{PetService, api};
pub use store::{NewPet, Pet, PetFilter, PetStore};
