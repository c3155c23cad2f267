// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Pet store problems

use axum::http::StatusCode;
use rest::{HasProblemDetail, ProblemDetail};
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// No pet has the requested id
#[derive(Debug, Serialize, Error)]
#[error("pet {pet_id} not found")]
pub struct PetNotFound {
    #[serde(flatten)]
    problem: ProblemDetail,
    /// Requested id
    pub pet_id: u64,
}

impl PetNotFound {
    /// Problem for `pet_id`, typed under `type_base` when configured
    pub fn new(pet_id: u64, type_base: Option<&Url>) -> Self {
        let mut problem = ProblemDetail::new(StatusCode::NOT_FOUND, "Pet not found")
            .with_detail(format!("No pet has id {pet_id}."))
            .with_instance(format!("/pets/{pet_id}"));
        if let Some(base) = type_base {
            problem = problem.with_type(format!(
                "{}/pet-not-found",
                base.as_str().trim_end_matches('/')
            ));
        }
        Self { problem, pet_id }
    }
}

impl HasProblemDetail for PetNotFound {
    fn problem_detail(&self) -> &ProblemDetail {
        &self.problem
    }
}

impl From<PetNotFound> for rest::Error {
    fn from(error: PetNotFound) -> Self {
        Self::problem(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_extension_member() {
        let base = Url::parse("https://pets.example/problems/").unwrap();
        let value = serde_json::to_value(PetNotFound::new(7, Some(&base))).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "https://pets.example/problems/pet-not-found",
                "title": "Pet not found",
                "status": 404,
                "detail": "No pet has id 7.",
                "instance": "/pets/7",
                "pet_id": 7,
            })
        );
    }

    #[test]
    fn maps_to_404() {
        let error = rest::Error::from(PetNotFound::new(7, None));
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }
}
