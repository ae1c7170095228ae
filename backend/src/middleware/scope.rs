//! Request scope extraction
//!
//! The acting branch and user arrive as headers set by the gateway in front
//! of this service. A missing branch header, or "All Branches", means the
//! request is not tied to one branch: reads see every branch and writes that
//! need an owner are rejected by the services.

use axum::http::{request::Parts, HeaderMap};
use shared::{validate_branch_code, BranchScope, RequestScope};

use crate::error::AppError;

pub const BRANCH_HEADER: &str = "x-branch";
pub const USERNAME_HEADER: &str = "x-username";
pub const EMAIL_HEADER: &str = "x-email";

/// Extractor for the caller's [`RequestScope`]
#[derive(Debug, Clone)]
pub struct Scope(pub RequestScope);

fn header(headers: &HeaderMap, name: &'static str) -> Result<Option<String>, AppError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim().to_string()).filter(|v| !v.is_empty()))
            .map_err(|_| AppError::validation(name, "header must be visible ASCII")),
    }
}

/// Build the scope from request headers
pub fn scope_from_headers(headers: &HeaderMap) -> Result<RequestScope, AppError> {
    let branch = BranchScope::parse(&header(headers, BRANCH_HEADER)?.unwrap_or_default());
    if let Some(code) = branch.code() {
        validate_branch_code(code).map_err(|m| AppError::validation(BRANCH_HEADER, m))?;
    }

    Ok(RequestScope {
        branch,
        username: header(headers, USERNAME_HEADER)?,
        email: header(headers, EMAIL_HEADER)?,
    })
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for Scope
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        scope_from_headers(&parts.headers).map(Scope)
    }
}
