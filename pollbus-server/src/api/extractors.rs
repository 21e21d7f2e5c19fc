//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `CallerContext` — resolves the tenant a poll call is scoped to,
//!   either from a bearer token (authenticated) or from the
//!   `X-Bus-Tenant` header (anonymous, restricted context).
//! - `AdminAuth` — verifies the `X-Admin-Secret` header for the admin
//!   publish endpoint.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use compact_str::CompactString;
use pollbus_sdk::objects::admin::ADMIN_SECRET_HEADER;
use pollbus_sdk::objects::bus::TENANT_HEADER;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// CallerContext — who is polling, and for which tenant
// ---------------------------------------------------------------------------

/// The identity a poll call runs under.
///
/// Anonymous callers get the same channel-scoping rules as authenticated
/// ones; nothing privileged hangs off `authenticated` today, it exists
/// so handlers can log and rate decisions can be layered on later.
pub struct CallerContext {
    pub tenant: CompactString,
    pub authenticated: bool,
}

/// Errors returned by the [`CallerContext`] extractor.
#[derive(Debug, thiserror::Error)]
pub enum CallerError {
    #[error("no bearer token and no tenant header")]
    MissingIdentity,
    #[error("unknown bearer token")]
    UnknownToken,
    #[error("malformed authentication header")]
    InvalidHeader,
}

impl IntoResponse for CallerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            CallerError::MissingIdentity => (
                StatusCode::UNAUTHORIZED,
                "provide a bearer token or an X-Bus-Tenant header",
            ),
            CallerError::UnknownToken => (StatusCode::UNAUTHORIZED, "unknown bearer token"),
            CallerError::InvalidHeader => {
                (StatusCode::BAD_REQUEST, "malformed authentication header")
            }
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for CallerContext {
    type Rejection = CallerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
            let value = value.to_str().map_err(|_| CallerError::InvalidHeader)?;
            let token = value
                .strip_prefix("Bearer ")
                .ok_or(CallerError::InvalidHeader)?;
            let tenant = state
                .auth
                .tenant_for_token(token)
                .ok_or(CallerError::UnknownToken)?;
            return Ok(CallerContext {
                tenant,
                authenticated: true,
            });
        }

        if let Some(value) = parts.headers.get(TENANT_HEADER) {
            let tenant = value.to_str().map_err(|_| CallerError::InvalidHeader)?;
            if tenant.is_empty() {
                return Err(CallerError::InvalidHeader);
            }
            return Ok(CallerContext {
                tenant: CompactString::from(tenant),
                authenticated: false,
            });
        }

        Err(CallerError::MissingIdentity)
    }
}

// ---------------------------------------------------------------------------
// AdminAuth — admin endpoint authentication
// ---------------------------------------------------------------------------

/// Verifies the `X-Admin-Secret` header against the configured secret.
pub struct AdminAuth;

/// Errors returned by the [`AdminAuth`] extractor.
#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("missing X-Admin-Secret header")]
    MissingSecret,
    #[error("malformed X-Admin-Secret header")]
    InvalidHeader,
    #[error("admin secret mismatch")]
    SecretMismatch,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminAuthError::MissingSecret => {
                (StatusCode::UNAUTHORIZED, "missing X-Admin-Secret header")
            }
            AdminAuthError::InvalidHeader => {
                (StatusCode::BAD_REQUEST, "malformed X-Admin-Secret header")
            }
            AdminAuthError::SecretMismatch => {
                (StatusCode::UNAUTHORIZED, "admin secret mismatch")
            }
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let candidate = parts
            .headers
            .get(ADMIN_SECRET_HEADER)
            .ok_or(AdminAuthError::MissingSecret)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidHeader)?;

        if !state.auth.verify_admin(candidate) {
            return Err(AdminAuthError::SecretMismatch);
        }

        Ok(AdminAuth)
    }
}
