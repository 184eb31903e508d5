use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// Identity carried by a valid session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl SessionUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

/// Verifies HS256 bearer tokens issued by the identity provider.
///
/// Expiry and not-before are checked against the caller-supplied clock instead of the
/// wall clock so handlers stay deterministic under test.
#[derive(Clone)]
pub struct SessionValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Resolves the session from `Authorization: Bearer <token>`. Anything missing,
    /// malformed, expired or not yet valid yields `None`.
    pub fn get_session(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Option<Session> {
        let token = bearer_token(headers)?;
        match self.validate(token, now) {
            Ok(session) => Some(session),
            Err(err) => {
                debug!(stage = "auth", error = %err, "session token rejected");
                None
            }
        }
    }

    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Session, TokenError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| TokenError::Invalid(format!("{err}")))?
            .claims;

        let now_ts = now.timestamp();
        if let Some(nbf) = claims.nbf {
            if now_ts < nbf {
                return Err(TokenError::NotYetValid);
            }
        }
        if now_ts >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.sub.trim().is_empty() {
            return Err(TokenError::Invalid("empty subject".to_string()));
        }

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| TokenError::Invalid("exp out of range".to_string()))?;

        Ok(Session {
            user: SessionUser {
                id: claims.sub,
                name: claims.name,
                email: claims.email,
            },
            expires_at,
        })
    }

    /// Mints a token for `user` valid until `expires_at`.
    pub fn issue(&self, user: &SessionUser, expires_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = SessionClaims {
            sub: user.id.clone(),
            exp: expires_at.timestamp(),
            nbf: None,
            name: user.name.clone(),
            email: user.email.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(TokenError::Encode)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("failed to sign token: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

/// Extractor for procedures that require a signed-in caller.
#[derive(Debug, Clone)]
pub struct RequireSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for RequireSession {
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.sessions().get_session(&parts.headers, state.now()) {
            Some(session) => {
                debug!(stage = "auth", user_id = %session.user.id, expires_at = %session.expires_at, "session accepted");
                Ok(Self(session))
            }
            None => {
                let procedure = parts
                    .uri
                    .path()
                    .trim_start_matches("/rpc/")
                    .to_string();
                counter!("rpc_requests_total", "procedure" => procedure.clone(), "result" => "unauthenticated")
                    .increment(1);
                debug!(stage = "auth", %procedure, "rejected unauthenticated call");
                Err(ProblemResponse::new(
                    StatusCode::UNAUTHORIZED,
                    "unauthenticated",
                    "sign in to perform this action",
                ))
            }
        }
    }
}
