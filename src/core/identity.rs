//! Identity resolver
//!
//! Turns the `Authorization: Bearer <jwt>` header into an [`AuthContext`].
//! Every failure (missing header, bad signature, expired token, unknown
//! subject) resolves to [`AuthContext::Anonymous`]; endpoints decide what an
//! anonymous caller may do.
//!
//! Resolution costs a signature check plus a user lookup, so it runs at most
//! once per request: [`resolve_identity`] stores the result in the request
//! extensions and the [`AuthContext`] extractor reads it back from there.

use crate::core::auth::AuthContext;
use crate::core::service::Repository;
use crate::entities::User;
use axum::extract::{FromRef, FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

/// Claims carried by issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token could not be signed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),

    #[error("token rejected: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("token subject '{0}' is not a user id")]
    BadSubject(String),
}

/// HS256 token issuer and verifier
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Sign a token whose subject is `user_id`
    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Encode)
    }

    /// Verify signature and expiry and return the subject
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(TokenError::Invalid)?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::BadSubject(data.claims.sub))
    }
}

/// Resolves request credentials to a caller
pub struct IdentityResolver {
    tokens: TokenService,
    users: Arc<dyn Repository<User>>,
}

impl IdentityResolver {
    pub fn new(tokens: TokenService, users: Arc<dyn Repository<User>>) -> Self {
        Self { tokens, users }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Resolve the caller from request headers; never fails
    pub async fn resolve(&self, headers: &HeaderMap) -> AuthContext {
        let Some(token) = bearer_token(headers) else {
            return AuthContext::Anonymous;
        };

        let user_id = match self.tokens.verify(token) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "bearer token ignored");
                return AuthContext::Anonymous;
            }
        };

        match self.users.get(&user_id).await {
            Ok(Some(user)) => AuthContext::User(user),
            Ok(None) => {
                tracing::debug!(%user_id, "token subject does not exist");
                AuthContext::Anonymous
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "user lookup failed during identity resolution");
                AuthContext::Anonymous
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Middleware resolving the caller once and caching it on the request
pub async fn resolve_identity(
    State(resolver): State<Arc<IdentityResolver>>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = resolver.resolve(request.headers()).await;
    request.extensions_mut().insert(context);
    next.run(request).await
}

impl<S> FromRequestParts<S> for AuthContext
where
    Arc<IdentityResolver>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<AuthContext>() {
            return Ok(context.clone());
        }

        let resolver = Arc::<IdentityResolver>::from_ref(state);
        let context = resolver.resolve(&parts.headers).await;
        parts.extensions.insert(context.clone());
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Role;
    use crate::storage::InMemoryRepository;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    async fn resolver_with_user() -> (IdentityResolver, User) {
        let users = Arc::new(InMemoryRepository::<User>::new());
        let user = users
            .insert(User {
                id: Uuid::new_v4(),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: String::new(),
                role: Role::Student,
            })
            .await
            .unwrap();
        (IdentityResolver::new(TokenService::new("secret", 24), users), user)
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = TokenService::new("secret", 24);
        let id = Uuid::new_v4();
        let token = tokens.issue(id).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), id);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = TokenService::new("secret", 24).issue(Uuid::new_v4()).unwrap();
        assert!(matches!(
            TokenService::new("other", 24).verify(&token),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = TokenService::new("secret", -2);
        let token = tokens.issue(Uuid::new_v4()).unwrap();
        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_resolve_known_user() {
        let (resolver, user) = resolver_with_user().await;
        let token = resolver.tokens().issue(user.id).unwrap();

        let ctx = resolver.resolve(&headers_with(&format!("Bearer {}", token))).await;
        assert_eq!(ctx.user_id(), Some(user.id));
    }

    #[tokio::test]
    async fn test_resolve_failures_are_anonymous() {
        let (resolver, _) = resolver_with_user().await;
        let unknown = resolver.tokens().issue(Uuid::new_v4()).unwrap();

        for value in ["Bearer garbage".to_string(), format!("Bearer {}", unknown)] {
            let ctx = resolver.resolve(&headers_with(&value)).await;
            assert!(matches!(ctx, AuthContext::Anonymous));
        }
        assert!(!resolver.resolve(&HeaderMap::new()).await.is_authenticated());
    }
}
