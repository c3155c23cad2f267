// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Request-scoped context handed to handlers and verifiers

use axum::http::Extensions;
use tokio_util::sync::CancellationToken;

use crate::param::{Cookie, Location, ParamValue, Params};

/// Typed values attached to one request
///
/// A context is never mutated in place by the framework; verifiers return a new
/// one built with [`Context::with`], which replaces the request's context for
/// everything downstream.
#[derive(Debug, Clone, Default)]
pub struct Context {
    extensions: Extensions,
}

impl Context {
    /// Wrap request extensions
    pub fn new(extensions: Extensions) -> Self {
        Self { extensions }
    }

    /// Typed value previously attached to the request
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Context with one more typed value, replacing any previous value of `T`
    #[must_use]
    pub fn with<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    /// Parameters injected by the operation's interceptors
    pub fn params(&self) -> Option<&Params> {
        self.get::<Params>()
    }

    /// Values of a query parameter
    pub fn query(&self, name: &str) -> Option<&[String]> {
        match self.params()?.get(Location::Query, name)? {
            ParamValue::Query(values) => Some(values),
            _ => None,
        }
    }

    /// First value of a query parameter
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query(name)?.first().map(String::as_str)
    }

    /// Values of a header parameter; names are case-insensitive
    pub fn header(&self, name: &str) -> Option<&[String]> {
        match self.params()?.get(Location::Header, name)? {
            ParamValue::Headers(values) => Some(values),
            _ => None,
        }
    }

    /// Value of a path parameter
    pub fn path_param(&self, name: &str) -> Option<&str> {
        match self.params()?.get(Location::Path, name)? {
            ParamValue::Path(value) => Some(value),
            _ => None,
        }
    }

    /// Cookies sent under a name
    pub fn cookies(&self, name: &str) -> Option<&[Cookie]> {
        match self.params()?.get(Location::Cookie, name)? {
            ParamValue::Cookies(cookies) => Some(cookies),
            _ => None,
        }
    }

    /// Server-wide cancellation, cancelled when shutdown starts
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.get::<CancellationToken>()
    }

    /// Borrow the underlying extensions
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Unwrap into request extensions
    pub fn into_extensions(self) -> Extensions {
        self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct User(&'static str);

    #[test]
    fn with_returns_extended_context() {
        let ctx = Context::default();
        assert!(ctx.get::<User>().is_none());

        let ctx = ctx.with(User("alice"));
        assert_eq!(ctx.get::<User>(), Some(&User("alice")));

        let ctx = ctx.with(User("bob"));
        assert_eq!(ctx.get::<User>(), Some(&User("bob")));
    }

    #[test]
    fn param_accessors() {
        let mut params = Params::default();
        params.insert(Location::Query, "q", ParamValue::Query(vec!["rust".into()]));
        params.insert(
            Location::Header,
            "X-Trace",
            ParamValue::Headers(vec!["abc".into()]),
        );
        params.insert(Location::Path, "id", ParamValue::Path("7".into()));

        let ctx = Context::default().with(params);
        assert_eq!(ctx.query_value("q"), Some("rust"));
        assert_eq!(ctx.header("x-trace"), Some(&["abc".to_string()][..]));
        assert_eq!(ctx.path_param("id"), Some("7"));
        assert!(ctx.cookies("session").is_none());
    }

    #[test]
    fn cancellation_is_optional() {
        assert!(Context::default().cancellation().is_none());

        let token = CancellationToken::new();
        let ctx = Context::default().with(token.clone());
        token.cancel();
        assert!(ctx.cancellation().is_some_and(CancellationToken::is_cancelled));
    }
}
