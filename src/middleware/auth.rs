//! Bearer token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the token from the Authorization header
//! 2. Verify its JWT signature and expiry
//! 3. Inject the caller identity into the request
//! 4. Reject unauthorized requests with HTTP 401
//!
//! # Token Format
//!
//! HS256 JWT carrying the caller in `sub` and the expiry in `exp`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // caller
    pub exp: usize,  // expiry, unix seconds
    pub iat: usize,  // issued at
}

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; handlers extract it with
/// `Extension<AuthContext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Identity the token was issued to
    pub caller: String,
}

/// Issues and verifies bearer tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Use the configured secret, or a random one that only this process knows.
    pub fn from_secret(secret: Option<&str>) -> Self {
        match secret {
            Some(secret) => Self::new(secret),
            None => {
                tracing::warn!(
                    "AUTH_SECRET not set, generated a random secret; tokens from other processes will be rejected"
                );
                Self::new(generate_secret())
            }
        }
    }

    /// Issue a token for `caller` valid for `ttl`.
    pub fn issue(&self, caller: &str, ttl: Duration) -> Result<String, AppError> {
        if caller.is_empty() {
            return Err(AppError::InvalidRequest("Caller must be non-empty".to_string()));
        }

        let now = Utc::now().timestamp();
        let expires = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .and_then(|exp| usize::try_from(exp).ok())
            .ok_or_else(|| AppError::InvalidRequest("Token lifetime too long".to_string()))?;

        let claims = Claims {
            sub: caller.to_string(),
            exp: expires,
            iat: usize::try_from(now).unwrap_or_default(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::Signing)
    }

    /// Check signature and expiry, returning the caller.
    pub fn verify(&self, token: &str) -> Result<AuthContext, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AppError::InvalidToken)?
            .claims;
        tracing::debug!(
            caller = %claims.sub,
            issued_at = claims.iat,
            expires_at = claims.exp,
            "Verified bearer token"
        );

        Ok(AuthContext { caller: claims.sub })
    }
}

/// Generate cryptographically secure random secret.
///
/// # Output
///
/// 64 hex characters (32 random bytes)
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Bearer token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Verify signature and expiry
/// 3. If valid: inject `AuthContext` into request, call next handler
/// 4. If not: return 401 Unauthorized error
pub async fn auth_middleware(
    State(signer): State<Arc<TokenSigner>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidToken)?;

    let auth_context = signer.verify(token).inspect_err(|_| {
        tracing::warn!("Rejected request with invalid bearer token");
    })?;

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension, Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware as axum_middleware,
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_issued_token_verifies() {
        let signer = TokenSigner::new("s3cret");
        let token = signer.issue("alice", HOUR).unwrap();

        assert_eq!(signer.verify(&token).unwrap().caller, "alice");
    }

    #[test]
    fn test_forged_token_is_rejected() {
        let signer = TokenSigner::new("s3cret");
        let alice = signer.issue("alice", HOUR).unwrap();
        let mallory = signer.issue("mallory", HOUR).unwrap();

        // mallory's claims under alice's signature
        let (mallory_body, _) = mallory.rsplit_once('.').unwrap();
        let (_, alice_signature) = alice.rsplit_once('.').unwrap();
        let forged = format!("{}.{}", mallory_body, alice_signature);

        assert!(matches!(signer.verify(&forged), Err(AppError::InvalidToken)));
        assert!(matches!(
            TokenSigner::new("other").verify(&alice),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(signer.verify("garbage"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = TokenSigner::new("s3cret");
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: "alice".to_string(),
            exp: now - 60,
            iat: now - 120,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();

        assert!(matches!(signer.verify(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_empty_caller_is_refused() {
        let signer = TokenSigner::new("s3cret");
        assert!(signer.issue("", HOUR).is_err());
    }

    async fn whoami(Extension(auth): Extension<AuthContext>) -> String {
        auth.caller
    }

    fn app(signer: Arc<TokenSigner>) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route_layer(axum_middleware::from_fn_with_state(signer, auth_middleware))
    }

    #[tokio::test]
    async fn test_middleware_gates_requests() {
        let signer = Arc::new(TokenSigner::new("s3cret"));
        let token = signer.issue("gateway", HOUR).unwrap();

        let response = app(signer.clone())
            .oneshot(HttpRequest::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(signer)
            .oneshot(
                HttpRequest::get("/whoami")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"gateway");
    }
}
