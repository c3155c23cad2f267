// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! RFC 7807 problem details
//!
//! [`ProblemDetailsHandler`] renders every operation failure as
//! `application/problem+json`. Only errors whose author embedded a
//! [`ProblemDetail`] reach the client verbatim; framework errors get a fixed
//! title and detail, and everything else becomes a redacted 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use url::Url;
use utoipa::{
    PartialSchema, ToSchema,
    openapi::{
        Components, Ref, RefOr, Response as ResponseSpec, content::ContentBuilder,
        response::ResponseBuilder,
    },
};

use crate::error::{BadRequest, Error, ErrorHandler, Unauthorized, problem_json_response};

/// Problem details media type
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Type URI used when no base is configured
pub const ABOUT_BLANK: &str = "about:blank";

const INTERNAL_ERROR_DETAIL: &str = "An internal server error occurred.";

/// RFC 7807 problem detail members
///
/// Error types embed this with `#[serde(flatten)]` next to their own extension
/// members and implement [`HasProblemDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProblemDetail {
    /// Problem type URI
    #[serde(rename = "type")]
    pub type_uri: String,
    /// Short summary of the problem type
    pub title: String,
    /// HTTP status code
    pub status: u16,
    /// Explanation specific to this occurrence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// URI identifying this occurrence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetail {
    /// `about:blank` problem with a status and title
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            type_uri: ABOUT_BLANK.to_string(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    /// Set the problem type URI
    #[must_use]
    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        self.type_uri = type_uri.into();
        self
    }

    /// Set the occurrence detail
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the occurrence URI
    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

impl std::fmt::Display for ProblemDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.title)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ProblemDetail {}

/// Error values that carry a problem detail
///
/// Wrap them with [`Error::problem`] to return them from a handler.
pub trait HasProblemDetail: Serialize + std::error::Error + Send + Sync + 'static {
    /// The embedded problem detail
    fn problem_detail(&self) -> &ProblemDetail;
}

impl HasProblemDetail for ProblemDetail {
    fn problem_detail(&self) -> &ProblemDetail {
        self
    }
}

/// Error handler writing `application/problem+json`
#[derive(Debug, Clone, Default)]
pub struct ProblemDetailsHandler {
    type_base: Option<Url>,
}

impl ProblemDetailsHandler {
    /// Handler using `about:blank` as the type of framework problems
    pub fn new() -> Self {
        Self::default()
    }

    /// Framework problems get `{base}/{slug}` as their type
    #[must_use]
    pub fn with_type_base(mut self, base: Url) -> Self {
        self.type_base = Some(base);
        self
    }

    fn type_uri(&self, slug: &str) -> String {
        match &self.type_base {
            Some(base) => format!("{}/{slug}", base.as_str().trim_end_matches('/')),
            None => ABOUT_BLANK.to_string(),
        }
    }

    fn generic(&self, status: StatusCode, slug: &str, detail: &str) -> Response {
        let problem = ProblemDetail::new(status, status.canonical_reason().unwrap_or_default())
            .with_type(self.type_uri(slug))
            .with_detail(detail);
        match serde_json::to_value(&problem) {
            Ok(body) => problem_json_response(status, &body),
            Err(e) => {
                error!(error = %e, "failed to serialize problem detail");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    fn render(&self, error: Error) -> Response {
        match error {
            Error::Problem(embedded) => embedded.into_response(),
            Error::Custom(custom) => custom.render(),
            Error::BadRequest(cause) => {
                let (slug, detail) = match cause {
                    BadRequest::MissingRequiredParameter { .. } => (
                        "missing-required-parameter",
                        "A required parameter is missing.",
                    ),
                    BadRequest::InvalidParameterValue { .. } => (
                        "invalid-parameter-value",
                        "A parameter value is invalid.",
                    ),
                    BadRequest::InvalidContentType { .. } => (
                        "invalid-content-type",
                        "The request content type is not supported.",
                    ),
                    BadRequest::InvalidJwt(_) => (
                        "invalid-jwt-format",
                        "The authorization token is missing or malformed.",
                    ),
                    BadRequest::MalformedBody(_) => {
                        ("bad-request", "The request body could not be processed.")
                    }
                };
                self.generic(StatusCode::BAD_REQUEST, slug, detail)
            }
            Error::Unauthorized(cause) => {
                let (slug, detail) = match cause {
                    Unauthorized::InvalidJwt(_) => {
                        ("invalid-jwt", "The authorization token is invalid.")
                    }
                    Unauthorized::Denied(_) => ("unauthorized", "Access is denied."),
                };
                self.generic(StatusCode::UNAUTHORIZED, slug, detail)
            }
            Error::Panic(_) | Error::Internal(_) => self.generic(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal-error",
                INTERNAL_ERROR_DETAIL,
            ),
        }
    }
}

impl ErrorHandler for ProblemDetailsHandler {
    fn handle_error(&self, error: Error) -> Response {
        let message = error.to_string();
        let response = self.render(error);
        error!(error = %message, status = %response.status(), "operation failed");
        response
    }

    fn error_responses(&self, components: &mut Components) -> Vec<(StatusCode, ResponseSpec)> {
        let name = ProblemDetail::name();
        components
            .schemas
            .entry(name.to_string())
            .or_insert_with(ProblemDetail::schema);

        [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::INTERNAL_SERVER_ERROR,
        ]
        .into_iter()
        .map(|status| {
            let content = ContentBuilder::new()
                .schema(Some(RefOr::Ref(Ref::from_schema_name(name.clone()))))
                .build();
            let response = ResponseBuilder::new()
                .description(status.canonical_reason().unwrap_or_default())
                .content(APPLICATION_PROBLEM_JSON, content)
                .build();
            (status, response)
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::http::header;

    use super::*;
    use crate::{
        error::{InvalidJwt, RenderError},
        param::Location,
    };

    #[derive(Debug, Serialize, thiserror::Error)]
    #[error("pet {pet_id} is already adopted")]
    struct AlreadyAdopted {
        #[serde(flatten)]
        problem: ProblemDetail,
        pet_id: u64,
    }

    impl HasProblemDetail for AlreadyAdopted {
        fn problem_detail(&self) -> &ProblemDetail {
            &self.problem
        }
    }

    async fn body(response: Response) -> serde_json::Value {
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            APPLICATION_PROBLEM_JSON
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn embedded_problems_keep_extension_members() {
        let error = Error::problem(AlreadyAdopted {
            problem: ProblemDetail::new(StatusCode::CONFLICT, "Already adopted")
                .with_type("https://pets.example/problems/adopted")
                .with_detail("Rex found a home last week")
                .with_instance("/pets/7"),
            pet_id: 7,
        });

        let response = ProblemDetailsHandler::new().handle_error(error);
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body(response).await,
            serde_json::json!({
                "type": "https://pets.example/problems/adopted",
                "title": "Already adopted",
                "status": 409,
                "detail": "Rex found a home last week",
                "instance": "/pets/7",
                "pet_id": 7,
            })
        );
    }

    #[tokio::test]
    async fn internal_errors_are_redacted() {
        let error = Error::from(anyhow::anyhow!("password is secret123"));
        let response = ProblemDetailsHandler::new().handle_error(error);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body(response).await;
        assert_eq!(body["detail"], INTERNAL_ERROR_DETAIL);
        assert_eq!(body["type"], ABOUT_BLANK);
        assert!(!body.to_string().contains("secret123"));
    }

    #[tokio::test]
    async fn panics_are_redacted() {
        let response =
            ProblemDetailsHandler::new().handle_error(Error::Panic("token=abc".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body(response).await.to_string().contains("abc"));
    }

    #[tokio::test]
    async fn framework_errors_use_slugs_under_a_base() {
        let handler = ProblemDetailsHandler::new()
            .with_type_base(Url::parse("https://pets.example/problems/").unwrap());

        let cases = [
            (
                Error::from(BadRequest::MissingRequiredParameter {
                    name: "q".to_string(),
                    location: Location::Query,
                }),
                StatusCode::BAD_REQUEST,
                "missing-required-parameter",
            ),
            (
                Error::from(BadRequest::InvalidParameterValue {
                    name: "page".to_string(),
                    location: Location::Query,
                }),
                StatusCode::BAD_REQUEST,
                "invalid-parameter-value",
            ),
            (
                Error::from(BadRequest::InvalidContentType {
                    expected: "application/json",
                    found: None,
                }),
                StatusCode::BAD_REQUEST,
                "invalid-content-type",
            ),
            (
                Error::from(BadRequest::InvalidJwt(InvalidJwt::MissingBearerPrefix)),
                StatusCode::BAD_REQUEST,
                "invalid-jwt-format",
            ),
            (
                Error::from(BadRequest::MalformedBody("eof".into())),
                StatusCode::BAD_REQUEST,
                "bad-request",
            ),
            (
                Error::from(Unauthorized::InvalidJwt(InvalidJwt::Rejected {
                    cause: anyhow::anyhow!("expired"),
                })),
                StatusCode::UNAUTHORIZED,
                "invalid-jwt",
            ),
            (
                Error::denied("not the owner"),
                StatusCode::UNAUTHORIZED,
                "unauthorized",
            ),
            (
                Error::from(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal-error",
            ),
        ];

        for (error, status, slug) in cases {
            let response = handler.handle_error(error);
            assert_eq!(response.status(), status);
            let body = body(response).await;
            assert_eq!(body["type"], format!("https://pets.example/problems/{slug}"));
            assert_eq!(body["status"], status.as_u16());
            assert_eq!(body["title"], status.canonical_reason().unwrap());
        }
    }

    #[tokio::test]
    async fn missing_parameter_matches_generic_shape() {
        let error = Error::from(BadRequest::MissingRequiredParameter {
            name: "q".to_string(),
            location: Location::Query,
        });
        let body = body(ProblemDetailsHandler::new().handle_error(error)).await;
        assert_eq!(body["type"], ABOUT_BLANK);
        assert_eq!(body["title"], "Bad Request");
        assert_eq!(body["status"], 400);
        assert!(!body.to_string().contains("`q`"));
    }

    #[test]
    fn documents_problem_responses() {
        let mut components = Components::new();
        let responses = ProblemDetailsHandler::new().error_responses(&mut components);
        let statuses: Vec<_> = responses.iter().map(|(status, _)| status.as_u16()).collect();
        assert_eq!(statuses, [400, 401, 500]);
        assert!(components.schemas.contains_key("ProblemDetail"));

        let value = serde_json::to_value(&responses[0].1).unwrap();
        assert_eq!(
            value["content"][APPLICATION_PROBLEM_JSON]["schema"]["$ref"],
            "#/components/schemas/ProblemDetail"
        );
    }

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded")]
    struct QuotaExceeded(Arc<AtomicUsize>);

    impl RenderError for QuotaExceeded {
        fn render(&self) -> Response {
            self.0.fetch_add(1, Ordering::SeqCst);
            StatusCode::TOO_MANY_REQUESTS.into_response()
        }
    }

    #[test]
    fn custom_errors_render_once() {
        let renders = Arc::new(AtomicUsize::new(0));
        let response = ProblemDetailsHandler::new()
            .handle_error(Error::custom(QuotaExceeded(Arc::clone(&renders))));

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn problem_detail_serializes_type_member() {
        let value = serde_json::to_value(ProblemDetail::new(StatusCode::NOT_FOUND, "Not Found"))
            .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "about:blank", "title": "Not Found", "status": 404})
        );
    }
}
