// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! The served document describes exactly what was registered

use axum::http::StatusCode;
use rest::{
    Api, Context, Operation, Param, Path, ProblemDetailsHandler, RegistrationError, Server,
    ServerConfig, ShutdownConfig,
    handler::json::{handle_json, produce_json},
    security::verifier_fn,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct NewPet {
    name: String,
    tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct Pet {
    id: u64,
    name: String,
}

async fn create(_ctx: Context, pet: NewPet) -> rest::Result<Pet> {
    Ok(Pet {
        id: 1,
        name: pet.name,
    })
}

async fn find(_ctx: Context) -> rest::Result<Pet> {
    Ok(Pet {
        id: 1,
        name: "rex".to_string(),
    })
}

fn pet_api() -> Api {
    let verifier =
        verifier_fn(|ctx: Context, _token: String| async move { Ok::<_, anyhow::Error>(ctx) });
    Api::new("pet store", "2.1.0")
        .with(
            Operation::post(Path::base("/pets"), handle_json(create))
                .param(Param::header("Authorization").required().jwt_auth("jwt", verifier))
                .summary("Create a pet")
                .tag("pets"),
        )
        .unwrap()
        .with(
            Operation::get(
                Path::base("/pets").param_with("id", |p| p.regex(r"^\d+$")),
                produce_json(find),
            )
            .param(Param::query("fields").description("Projection"))
            .on_error(ProblemDetailsHandler::new()),
        )
        .unwrap()
}

async fn served_document(api: Api) -> Value {
    let (addr, _) = Server::new(ServerConfig::for_testing(), api, ShutdownConfig::default())
        .run_for_testing()
        .await
        .expect("Failed to start test server");

    let response = reqwest::get(format!("http://{addr}/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    response.json().await.unwrap()
}

#[tokio::test]
async fn document_lists_registered_operations() {
    let document = served_document(pet_api()).await;

    assert_eq!(document["info"]["title"], "pet store");
    assert_eq!(document["info"]["version"], "2.1.0");

    let paths = document["paths"].as_object().unwrap();
    let mut keys: Vec<_> = paths.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, ["/pets", "/pets/{id}"]);

    let create = &paths["/pets"]["post"];
    assert_eq!(create["summary"], "Create a pet");
    assert_eq!(create["tags"][0], "pets");
    assert_eq!(create["operationId"], "postPets");
    assert!(create["requestBody"]["content"]["application/json"].is_object());
    assert!(create["responses"]["200"]["content"]["application/json"].is_object());
    assert_eq!(create["security"][0]["jwt"], Value::Array(vec![]));
    assert!(paths["/pets"].get("get").is_none());

    let find = &paths["/pets/{id}"]["get"];
    let parameters = find["parameters"].as_array().unwrap();
    let id = parameters.iter().find(|p| p["name"] == "id").unwrap();
    assert_eq!(id["in"], "path");
    assert_eq!(id["required"], true);
    assert_eq!(id["schema"]["pattern"], r"^\d+$");
    let fields = parameters.iter().find(|p| p["name"] == "fields").unwrap();
    assert_eq!(fields["in"], "query");
    assert_eq!(fields["description"], "Projection");
    assert!(find.get("requestBody").is_none());
    assert!(find["responses"]["400"]["content"]["application/problem+json"].is_object());

    let schemes = &document["components"]["securitySchemes"];
    assert_eq!(schemes["jwt"]["type"], "http");
    assert_eq!(schemes["jwt"]["scheme"], "bearer");
    assert_eq!(schemes["jwt"]["bearerFormat"], "JWT");
    assert!(document["components"]["schemas"]["ProblemDetail"].is_object());
}

#[tokio::test]
async fn document_excludes_framework_endpoints() {
    let document = served_document(pet_api()).await;
    let paths = document["paths"].as_object().unwrap();
    for reserved in [
        "/openapi.json",
        "/health/readiness",
        "/health/liveness",
        "/metrics",
    ] {
        assert!(!paths.contains_key(reserved));
    }
}

#[tokio::test]
async fn empty_api_serves_empty_paths() {
    let document = served_document(Api::new("empty", "0.0.1")).await;
    assert!(document["paths"].as_object().unwrap().is_empty());
}

#[test]
fn registration_rejects_conflicts() {
    let mut api = pet_api();

    assert!(matches!(
        api.register(Operation::post(Path::base("/pets"), handle_json(create))),
        Err(RegistrationError::DuplicateOperation { .. })
    ));
    assert!(matches!(
        api.register(
            Operation::get(Path::base("/owners"), produce_json(find))
                .param(Param::query("q").regex("[unclosed"))
        ),
        Err(RegistrationError::InvalidPattern { .. })
    ));
    assert!(matches!(
        api.register(
            Operation::get(Path::base("/owners").param("id").param("id"), produce_json(find))
        ),
        Err(RegistrationError::DuplicatePathParameter { .. })
    ));
    assert!(matches!(
        api.register(
            Operation::get(Path::base("/owners"), produce_json(find))
                .param(Param::path("missing"))
        ),
        Err(RegistrationError::UnknownPathParameter { .. })
    ));
    assert!(matches!(
        api.register(
            Operation::get(Path::base("/owners"), produce_json(find))
                .param(Param::query("token").jwt_auth(
                    "query-jwt",
                    verifier_fn(|ctx: Context, _token: String| async move {
                        Ok::<_, anyhow::Error>(ctx)
                    })
                ))
        ),
        Err(RegistrationError::MisplacedSecurityScheme { .. })
    ));

    let paths = &api.document().paths.paths;
    assert!(!paths.contains_key("/owners"));
    assert!(!paths.contains_key("/owners/{id}"));
}
