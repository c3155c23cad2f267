// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Pet store operations
//!
//! | Method   | Path           | In    | Out  | Auth   |
//! |----------|----------------|-------|------|--------|
//! | `GET`    | `/pets`        |       | JSON |        |
//! | `POST`   | `/pets`        | JSON  | JSON |        |
//! | `GET`    | `/pets/{id}`   |       | JSON |        |
//! | `DELETE` | `/pets/{id}`   |       | JSON | bearer |
//! | `GET`    | `/pets/page`   |       | HTML |        |
//! | `POST`   | `/pets/search` | form  | JSON |        |

use std::sync::Arc;

use anyhow::Result;
use rest::{
    Api, Context, Operation, Param, Path, ProblemDetailsHandler,
    config::OpenApiConfig,
    error::BadRequest,
    handler::{
        form::handle_form,
        html::{HtmlTemplate, produce_html},
        json::{handle_json, produce_json},
    },
    param::Location,
};
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::{
    auth::{self, Caller, JwtKeys},
    error::PetNotFound,
    store::{NewPet, Pet, PetFilter, PetStore},
};

const ID_PATTERN: &str = r"^\d+$";
const LIMIT_PATTERN: &str = r"^\d{1,4}$";
const BEARER_SCHEME: &str = "bearer";

const PAGE_TEMPLATE: &str = r"<!doctype html>
<html>
<head><title>{{ title }}</title></head>
<body>
<h1>{{ title }}</h1>
{% if pets %}
<ul>
{% for pet in pets %}  <li>{{ pet.name }} ({{ pet.species }}){% if pet.tag %} [{{ pet.tag }}]{% endif %}</li>
{% endfor %}</ul>
{% else %}
<p>No pets yet.</p>
{% endif %}
</body>
</html>
";

/// State shared by the pet store operations
#[derive(Debug)]
pub struct PetService {
    store: PetStore,
    keys: Arc<JwtKeys>,
    problem_base: Option<Url>,
}

impl PetService {
    /// Empty store guarded by `keys`
    pub fn new(keys: JwtKeys, problem_base: Option<Url>) -> Self {
        Self {
            store: PetStore::new(),
            keys: Arc::new(keys),
            problem_base,
        }
    }

    /// Backing store
    pub fn store(&self) -> &PetStore {
        &self.store
    }

    /// Token keys
    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    fn pet_id(ctx: &Context) -> rest::Result<u64> {
        ctx.path_param("id")
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| {
                BadRequest::InvalidParameterValue {
                    name: "id".to_string(),
                    location: Location::Path,
                }
                .into()
            })
    }

    fn not_found(&self, id: u64) -> rest::Error {
        PetNotFound::new(id, self.problem_base.as_ref()).into()
    }
}

#[derive(Debug, Serialize)]
struct PetPage {
    title: &'static str,
    pets: Vec<Pet>,
}

async fn list(service: Arc<PetService>, ctx: Context) -> rest::Result<Vec<Pet>> {
    let limit = ctx.query_value("limit").and_then(|limit| limit.parse().ok());
    Ok(service.store.list(limit))
}

async fn create(service: Arc<PetService>, _ctx: Context, pet: NewPet) -> rest::Result<Pet> {
    let pet = service.store.insert(pet);
    info!(id = pet.id, name = %pet.name, "pet created");
    Ok(pet)
}

async fn find(service: Arc<PetService>, ctx: Context) -> rest::Result<Pet> {
    let id = PetService::pet_id(&ctx)?;
    service.store.get(id).ok_or_else(|| service.not_found(id))
}

async fn remove(service: Arc<PetService>, ctx: Context) -> rest::Result<Pet> {
    let id = PetService::pet_id(&ctx)?;
    let caller = ctx
        .get::<Caller>()
        .map_or("unknown", |caller| caller.subject.as_str());
    let pet = service.store.remove(id).ok_or_else(|| service.not_found(id))?;
    info!(id, caller, "pet removed");
    Ok(pet)
}

async fn page(service: Arc<PetService>, _ctx: Context) -> rest::Result<PetPage> {
    Ok(PetPage {
        title: "Pets",
        pets: service.store.list(None),
    })
}

async fn search(
    service: Arc<PetService>,
    ctx: Context,
    filter: PetFilter,
) -> rest::Result<Vec<Pet>> {
    let limit = ctx.query_value("limit").and_then(|limit| limit.parse().ok());
    Ok(service.store.search(&filter, limit))
}

fn pet_path() -> Path {
    Path::base("/pets").param_with("id", |id| id.regex(ID_PATTERN).description("Pet id"))
}

fn limit() -> Param {
    Param::query("limit")
        .regex(LIMIT_PATTERN)
        .description("Maximum number of pets returned")
}

/// Document and route every pet store operation
pub fn api(service: &Arc<PetService>, openapi: &OpenApiConfig) -> Result<Api> {
    let problems = match &service.problem_base {
        Some(base) => ProblemDetailsHandler::new().with_type_base(base.clone()),
        None => ProblemDetailsHandler::new(),
    };

    let svc = Arc::clone(service);
    let list_pets = Operation::get(
        Path::base("/pets"),
        produce_json(move |ctx: Context| list(Arc::clone(&svc), ctx)),
    )
    .param(limit())
    .operation_id("listPets")
    .summary("List pets")
    .tag("pets");

    let svc = Arc::clone(service);
    let create_pet = Operation::post(
        Path::base("/pets"),
        handle_json(move |ctx: Context, pet: NewPet| create(Arc::clone(&svc), ctx, pet)),
    )
    .operation_id("createPet")
    .summary("Add a pet")
    .tag("pets");

    let svc = Arc::clone(service);
    let show_pet = Operation::get(
        pet_path(),
        produce_json(move |ctx: Context| find(Arc::clone(&svc), ctx)),
    )
    .operation_id("showPetById")
    .summary("Info for a specific pet")
    .tag("pets");

    let svc = Arc::clone(service);
    let delete_pet = Operation::delete(
        pet_path(),
        produce_json(move |ctx: Context| remove(Arc::clone(&svc), ctx)),
    )
    .param(
        Param::header("Authorization")
            .required()
            .jwt_auth(BEARER_SCHEME, auth::verifier(Arc::clone(&service.keys))),
    )
    .operation_id("deletePet")
    .summary("Remove a pet")
    .tag("pets");

    let svc = Arc::clone(service);
    let pet_page = Operation::get(
        Path::base("/pets").segment("page"),
        produce_html(
            move |ctx: Context| page(Arc::clone(&svc), ctx),
            HtmlTemplate::new("pets.html", PAGE_TEMPLATE)?,
        ),
    )
    .summary("Pets as a web page")
    .tag("pages");

    let svc = Arc::clone(service);
    let search_pets = Operation::post(
        Path::base("/pets").segment("search"),
        handle_form(move |ctx: Context, filter: PetFilter| {
            search(Arc::clone(&svc), ctx, filter)
        }),
    )
    .param(limit())
    .operation_id("searchPets")
    .summary("Find pets by species, name or age")
    .tag("pets");

    let api = Api::new(&openapi.title, &openapi.version)
        .error_handler(problems)
        .with(list_pets)?
        .with(create_pet)?
        .with(show_pet)?
        .with(delete_pet)?
        .with(pet_page)?
        .with(search_pets)?;
    Ok(api)
}
