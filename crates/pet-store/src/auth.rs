// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HS256 bearer tokens for destructive operations

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rest::{
    Context,
    security::{JwtVerifier, verifier_fn},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the caller's name
    pub sub: String,
    /// Expiry as seconds since the epoch
    pub exp: u64,
}

/// Authenticated caller, available to handlers through [`Context::get`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Token subject
    pub subject: String,
}

/// Signing and verification keys sharing one secret
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    /// Keys for `secret`
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign a token for `subject` valid for `ttl`
    pub fn issue(&self, subject: &str, ttl: Duration) -> jsonwebtoken::errors::Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let claims = Claims {
            sub: subject.to_string(),
            exp: (now + ttl).as_secs(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Check signature and expiry of `token`
    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
    }
}

/// Verifier adding the token's [`Caller`] to the request context
pub fn verifier(keys: Arc<JwtKeys>) -> impl JwtVerifier {
    verifier_fn(move |ctx: Context, token: String| {
        let keys = Arc::clone(&keys);
        async move {
            let claims = keys.verify(&token)?;
            debug!(subject = %claims.sub, "bearer token accepted");
            Ok::<_, anyhow::Error>(ctx.with(Caller {
                subject: claims.sub,
            }))
        }
    })
}

#[cfg(test)]
mod tests {
    use axum::http::Extensions;

    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let keys = JwtKeys::new(b"kennel");
        let token = keys.issue("alice", Duration::from_secs(60)).unwrap();
        assert_eq!(keys.verify(&token).unwrap().sub, "alice");
    }

    #[test]
    fn foreign_and_expired_tokens_fail() {
        let keys = JwtKeys::new(b"kennel");
        let foreign = JwtKeys::new(b"cattery")
            .issue("mallory", Duration::from_secs(60))
            .unwrap();
        assert!(keys.verify(&foreign).is_err());

        let stale = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                sub: "alice".to_string(),
                exp: 1,
            },
            &EncodingKey::from_secret(b"kennel"),
        )
        .unwrap();
        assert!(keys.verify(&stale).is_err());
        assert!(keys.verify("not.a.token").is_err());
    }

    #[tokio::test]
    async fn verifier_exposes_the_caller() {
        let keys = Arc::new(JwtKeys::new(b"kennel"));
        let token = keys.issue("alice", Duration::from_secs(60)).unwrap();
        let verifier = verifier(Arc::clone(&keys));

        let ctx = verifier
            .verify(Context::new(Extensions::new()), token)
            .await
            .unwrap();
        assert_eq!(ctx.get::<Caller>().unwrap().subject, "alice");

        assert!(
            verifier
                .verify(Context::new(Extensions::new()), "bad".to_string())
                .await
                .is_err()
        );
    }
}
