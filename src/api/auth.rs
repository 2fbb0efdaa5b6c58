//! JWT auth for the board API.
//!
//! - Clients submit a password (and a username in multi-user mode) to `/api/auth/login`
//! - Server returns a JWT valid for `JWT_TTL_DAYS`
//! - When `DEV_MODE=false`, all board endpoints require `Authorization: Bearer <jwt>`
//!
//! The authenticated user id is what workspace memberships are keyed on.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};
use crate::config::{AuthMode, UserAccount};

/// Single-tenant logins all act as this user.
const DEFAULT_USER_ID: &str = "default";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// User id
    sub: String,
    /// Username (for display/auditing)
    #[serde(default)]
    usr: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// Caller identity, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
}

impl AuthUser {
    pub fn dev() -> Self {
        Self {
            id: "dev".to_string(),
            username: "dev".to_string(),
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

fn issue_jwt(secret: &str, ttl_days: i64, user: &AuthUser) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user.id.clone(),
        usr: user.username.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

fn check_account<'a>(
    users: &'a [UserAccount],
    username: &str,
    password: &str,
) -> Option<&'a UserAccount> {
    let account = users.iter().find(|u| u.username.trim() == username);
    match account {
        Some(acc) => {
            let valid = !acc.password.trim().is_empty()
                && constant_time_eq(password.trim(), acc.password.trim());
            valid.then_some(acc)
        }
        None => {
            // Compare anyway so unknown usernames take as long as bad passwords.
            let _ = constant_time_eq(password.trim(), "dummy_password_for_timing");
            None
        }
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let user = match state.config.auth.auth_mode(state.config.dev_mode) {
        AuthMode::MultiUser => {
            let username = req.username.as_deref().unwrap_or("").trim();
            if username.is_empty() {
                return Err((StatusCode::UNAUTHORIZED, "Username required".to_string()));
            }
            let account = check_account(&state.config.auth.users, username, &req.password)
                .ok_or_else(|| {
                    (
                        StatusCode::UNAUTHORIZED,
                        "Invalid username or password".to_string(),
                    )
                })?;
            AuthUser {
                id: account.id.clone(),
                username: account.username.clone(),
            }
        }
        AuthMode::SingleTenant | AuthMode::Disabled => {
            // Login still works in dev mode, it just isn't required.
            let expected = state
                .config
                .auth
                .dashboard_password
                .as_deref()
                .unwrap_or("");

            if expected.is_empty() || !constant_time_eq(req.password.trim(), expected) {
                return Err((StatusCode::UNAUTHORIZED, "Invalid password".to_string()));
            }

            AuthUser {
                id: DEFAULT_USER_ID.to_string(),
                username: DEFAULT_USER_ID.to_string(),
            }
        }
    };

    let secret = state.config.auth.jwt_secret.as_deref().ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "JWT_SECRET not configured".to_string(),
        )
    })?;

    let (token, exp) = issue_jwt(secret, state.config.auth.jwt_ttl_days, &user)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    tracing::info!("User {} logged in", user.username);
    Ok(Json(LoginResponse { token, exp }))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode => no auth checks.
    if state.config.dev_mode {
        req.extensions_mut().insert(AuthUser::dev());
        return next.run(req).await;
    }

    // If auth isn't configured, fail closed in non-dev mode.
    let secret = match state.config.auth.jwt_secret.as_deref() {
        Some(s) => s,
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT_SECRET not configured",
            )
                .into_response();
        }
    };

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response();
    }

    match verify_jwt(token, secret) {
        Ok(claims) => {
            let user = match state.config.auth.auth_mode(state.config.dev_mode) {
                AuthMode::MultiUser => match user_for_claims(&claims, &state.config.auth.users) {
                    Some(u) => u,
                    None => {
                        return (StatusCode::UNAUTHORIZED, "Invalid user").into_response();
                    }
                },
                AuthMode::SingleTenant | AuthMode::Disabled => AuthUser {
                    id: claims.sub,
                    username: claims.usr,
                },
            };
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response(),
    }
}

fn user_for_claims(claims: &Claims, users: &[UserAccount]) -> Option<AuthUser> {
    users.iter().find(|u| u.id == claims.sub).map(|u| AuthUser {
        id: u.id.clone(),
        username: u.username.clone(),
    })
}
