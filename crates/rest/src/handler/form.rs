// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Form content adapter
//!
//! Bodies must carry exactly `Content-Type: application/x-www-form-urlencoded`
//! and are decoded with serde. Field keys follow `#[serde(rename)]`, falling back
//! to the field name; `#[serde(skip)]` fields are never read. Integers are range
//! checked, times use RFC 3339 through `chrono`, durations use [`duration`], and
//! any `FromStr` type can be read through `serde_with::DisplayFromStr`.

use std::future::Future;

use axum::{
    Form,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use utoipa::{
    ToSchema,
    openapi::{Components, request_body::RequestBody},
};

use super::{Handler, ReadRequest, json::ReturnJson, request_body, schema_of};
use crate::{
    context::Context,
    error::{BadRequest, Result},
};

/// Form media type
pub const APPLICATION_FORM: &str = "application/x-www-form-urlencoded";

/// Form decoded request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRequest<T>(pub T);

impl<T> ReadRequest for FormRequest<T>
where
    T: DeserializeOwned + ToSchema + Send + 'static,
{
    async fn read(req: Request) -> Result<Self> {
        super::content_type_is(&req, APPLICATION_FORM)?;
        let Form(value) = Form::<T>::from_request(req, &())
            .await
            .map_err(|rejection| BadRequest::MalformedBody(Box::new(rejection)))?;
        Ok(Self(value))
    }

    fn request_body(components: &mut Components) -> Option<RequestBody> {
        Some(request_body(APPLICATION_FORM, schema_of::<T>(components)))
    }
}

/// See [`consume_form`]
#[derive(Debug, Clone)]
pub struct ConsumeForm<H>(H);

impl<H, Req, Resp> Handler<FormRequest<Req>, Resp> for ConsumeForm<H>
where
    H: Handler<Req, Resp>,
{
    fn handle(
        &self,
        ctx: Context,
        req: FormRequest<Req>,
    ) -> impl Future<Output = Result<Resp>> + Send {
        self.0.handle(ctx, req.0)
    }
}

/// Read the request body as a form before calling `handler`
pub fn consume_form<H, Req, Resp>(handler: H) -> ConsumeForm<H>
where
    H: Handler<Req, Resp>,
{
    ConsumeForm(handler)
}

/// Form in, JSON out
pub fn handle_form<H, Req, Resp>(handler: H) -> ConsumeForm<ReturnJson<H>>
where
    H: Handler<Req, Resp>,
{
    ConsumeForm(super::json::return_json(handler))
}

/// Textual durations for form fields: `"1h30m"`, `"250ms"`, `"1.5s"`
///
/// Use with `#[serde(with = "rest::handler::form::duration")]`.
pub mod duration {
    use std::{fmt::Write, time::Duration};

    use serde::{Deserialize, Deserializer, Serializer, de};
    use thiserror::Error;

    /// Why a duration string was rejected
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum ParseDurationError {
        /// Nothing to parse
        #[error("empty duration")]
        Empty,
        /// A number was not followed by a unit
        #[error("missing unit in duration {0:?}")]
        MissingUnit(String),
        /// Unit outside `ns`, `us`, `ms`, `s`, `m`, `h`
        #[error("unknown unit {unit:?} in duration {input:?}")]
        UnknownUnit {
            /// Offending unit
            unit: String,
            /// Whole input
            input: String,
        },
        /// Not a number where one was expected
        #[error("invalid duration {0:?}")]
        Invalid(String),
        /// Larger than `Duration` can hold
        #[error("duration {0:?} overflows")]
        Overflow(String),
    }

    const UNITS: [(&str, u128); 7] = [
        ("ns", 1),
        ("us", 1_000),
        ("\u{b5}s", 1_000),
        ("ms", 1_000_000),
        ("s", 1_000_000_000),
        ("m", 60_000_000_000),
        ("h", 3_600_000_000_000),
    ];

    /// Parse a sequence of decimal numbers, each with a unit
    pub fn parse(input: &str) -> Result<Duration, ParseDurationError> {
        if input.is_empty() {
            return Err(ParseDurationError::Empty);
        }
        if input == "0" {
            return Ok(Duration::ZERO);
        }

        let invalid = || ParseDurationError::Invalid(input.to_string());
        let overflow = || ParseDurationError::Overflow(input.to_string());

        let mut rest = input;
        let mut total_nanos: u128 = 0;
        while !rest.is_empty() {
            let number_len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(rest.len());
            let (number, tail) = rest.split_at(number_len);
            if number.is_empty() || number == "." {
                return Err(invalid());
            }

            let unit_len = tail
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(tail.len());
            let (unit, tail) = tail.split_at(unit_len);
            if unit.is_empty() {
                return Err(ParseDurationError::MissingUnit(input.to_string()));
            }
            let scale = UNITS
                .iter()
                .find_map(|(name, scale)| (*name == unit).then_some(*scale))
                .ok_or_else(|| ParseDurationError::UnknownUnit {
                    unit: unit.to_string(),
                    input: input.to_string(),
                })?;

            let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
            let whole: u128 = if whole.is_empty() {
                0
            } else {
                whole.parse().map_err(|_| invalid())?
            };
            let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

            let mut divisor: u128 = 1;
            let mut fraction_value: u128 = 0;
            for digit in fraction.chars() {
                let digit = digit.to_digit(10).ok_or_else(invalid)?;
                if divisor >= 1_000_000_000_000_000_000 {
                    break;
                }
                fraction_value = fraction_value * 10 + u128::from(digit);
                divisor *= 10;
            }
            nanos = nanos
                .checked_add(fraction_value * scale / divisor)
                .ok_or_else(overflow)?;

            total_nanos = total_nanos.checked_add(nanos).ok_or_else(overflow)?;
            rest = tail;
        }

        let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| overflow())?;
        let subsec = u32::try_from(total_nanos % 1_000_000_000).map_err(|_| overflow())?;
        Ok(Duration::new(secs, subsec))
    }

    /// Format in the same notation, largest units first: `"1h30m0s"`, `"250ms"`
    pub fn format(duration: Duration) -> String {
        if duration.is_zero() {
            return "0s".to_string();
        }
        if duration.as_secs() == 0 {
            let nanos = duration.subsec_nanos();
            return if nanos % 1_000_000 == 0 {
                format!("{}ms", nanos / 1_000_000)
            } else if nanos % 1_000 == 0 {
                format!("{}us", nanos / 1_000)
            } else {
                format!("{nanos}ns")
            };
        }

        let total = duration.as_secs();
        let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
        let mut out = String::new();
        if hours > 0 {
            let _ = write!(out, "{hours}h");
        }
        if hours > 0 || minutes > 0 {
            let _ = write!(out, "{minutes}m");
        }
        let _ = write!(out, "{seconds}");
        let nanos = duration.subsec_nanos();
        if nanos > 0 {
            let fraction = format!("{nanos:09}");
            let _ = write!(out, ".{}", fraction.trim_end_matches('0'));
        }
        out.push('s');
        out
    }

    /// Serde deserializer
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(de::Error::custom)
    }

    /// Serde serializer
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(*duration))
    }
}

#[cfg(test)]
mod tests {
    use std::{net::Ipv4Addr, time::Duration};

    use axum::{
        body::Body,
        http::{StatusCode, header},
    };
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use serde_with::{DisplayFromStr, serde_as};

    use super::*;
    use crate::error::Error;

    #[serde_as]
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
    struct Search {
        #[serde(rename = "q")]
        query: String,
        limit: u8,
        exact: bool,
        score: f32,
        #[schema(value_type = String)]
        since: DateTime<Utc>,
        #[serde(with = "duration")]
        #[schema(value_type = String)]
        within: Duration,
        #[serde_as(as = "DisplayFromStr")]
        #[schema(value_type = String)]
        origin: Ipv4Addr,
        #[serde(skip)]
        internal: u32,
    }

    fn form(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, APPLICATION_FORM)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn decodes_supported_field_types() {
        let FormRequest(search) = FormRequest::<Search>::read(form(
            "q=cats&limit=10&exact=true&score=0.5&since=2025-01-02T03%3A04%3A05Z&within=1h30m&origin=10.0.0.1&internal=9",
        ))
        .await
        .unwrap();

        assert_eq!(search.query, "cats");
        assert_eq!(search.limit, 10);
        assert!(search.exact);
        assert!((search.score - 0.5).abs() < f32::EPSILON);
        assert_eq!(search.since.to_rfc3339(), "2025-01-02T03:04:05+00:00");
        assert_eq!(search.within, Duration::from_secs(5400));
        assert_eq!(search.origin, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(search.internal, 0);
    }

    #[tokio::test]
    async fn integer_overflow_is_rejected() {
        let result = FormRequest::<Search>::read(form(
            "q=cats&limit=300&exact=true&score=0.5&since=2025-01-02T03%3A04%3A05Z&within=1s&origin=10.0.0.1",
        ))
        .await;
        assert!(matches!(
            result,
            Err(Error::BadRequest(BadRequest::MalformedBody(_)))
        ));
    }

    #[tokio::test]
    async fn content_type_is_strict() {
        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded; charset=utf-8")
            .body(Body::from("q=cats"))
            .unwrap();
        let result = FormRequest::<Search>::read(req).await;
        assert!(matches!(
            result,
            Err(Error::BadRequest(BadRequest::InvalidContentType { .. }))
        ));
    }

    #[tokio::test]
    async fn handle_form_returns_json() {
        async fn count(_ctx: Context, search: Search) -> Result<usize> {
            Ok(search.query.len())
        }

        let FormRequest(search) = FormRequest::<Search>::read(form(
            "q=dogs&limit=1&exact=false&score=1&since=2025-01-02T03%3A04%3A05Z&within=250ms&origin=127.0.0.1",
        ))
        .await
        .unwrap();

        let response = handle_form(count)
            .handle(Context::default(), FormRequest(search))
            .await
            .unwrap();
        let response = crate::handler::WriteResponse::write(response).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn parses_durations() {
        assert_eq!(duration::parse("0"), Ok(Duration::ZERO));
        assert_eq!(duration::parse("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(duration::parse("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(duration::parse("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(duration::parse("2m3s4ms"), Ok(Duration::new(123, 4_000_000)));
        assert_eq!(duration::parse("10us"), Ok(Duration::from_micros(10)));
        assert_eq!(duration::parse("7ns"), Ok(Duration::from_nanos(7)));
        assert_eq!(duration::parse(".5h"), Ok(Duration::from_secs(1800)));

        assert_eq!(duration::parse(""), Err(duration::ParseDurationError::Empty));
        assert!(matches!(
            duration::parse("10"),
            Err(duration::ParseDurationError::MissingUnit(_))
        ));
        assert!(matches!(
            duration::parse("3d"),
            Err(duration::ParseDurationError::UnknownUnit { .. })
        ));
        assert!(matches!(
            duration::parse("-1s"),
            Err(duration::ParseDurationError::Invalid(_))
        ));
    }

    #[test]
    fn formats_durations() {
        assert_eq!(duration::format(Duration::ZERO), "0s");
        assert_eq!(duration::format(Duration::from_millis(250)), "250ms");
        assert_eq!(duration::format(Duration::from_secs(5400)), "1h30m0s");
        assert_eq!(duration::format(Duration::from_millis(1500)), "1.5s");
        assert_eq!(
            duration::parse(&duration::format(Duration::new(3723, 5_000_000))),
            Ok(Duration::new(3723, 5_000_000))
        );
    }
}
