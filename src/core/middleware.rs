//! Authentication gate: resolves the bearer token to an active employee
//! and attaches it to the request for downstream authorization checks.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::decode_token;
use crate::core::error::ApiError;
use crate::core::shared::enums::{EmployeeRole, EmployeeStatus};
use crate::core::shared::schema::employees;
use crate::core::shared::state::AppState;

/// The authenticated employee, resolved once per request.
#[derive(Debug, Clone)]
pub struct CurrentEmployee {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: EmployeeRole,
}

impl CurrentEmployee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == EmployeeRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::AccessDenied)
        }
    }

    /// Admin, or the employee acting on their own record.
    pub fn require_self_or_admin(&self, id: Uuid) -> Result<(), ApiError> {
        if self.is_admin() || self.id == id {
            Ok(())
        } else {
            Err(ApiError::AccessDenied)
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|auth| {
            if auth.to_lowercase().starts_with("bearer ") {
                Some(auth[7..].to_string())
            } else {
                None
            }
        })
}

/// Reject requests without a valid token for an active account.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()))?;

    let claims = decode_token(&token, &state.config.auth)?;

    let mut conn = state.conn.get()?;
    let row: Option<(Uuid, String, String, String, EmployeeRole, EmployeeStatus)> =
        employees::table
            .filter(employees::id.eq(claims.sub))
            .select((
                employees::id,
                employees::first_name,
                employees::last_name,
                employees::email,
                employees::role,
                employees::status,
            ))
            .first(&mut conn)
            .optional()?;

    let (id, first_name, last_name, email, role, status) = row
        .ok_or_else(|| ApiError::Unauthorized("Invalid token - user not found".to_string()))?;

    if status != EmployeeStatus::Active {
        return Err(ApiError::Unauthorized("Account is inactive".to_string()));
    }

    request.extensions_mut().insert(CurrentEmployee {
        id,
        first_name,
        last_name,
        email,
        role,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(role: EmployeeRole) -> CurrentEmployee {
        CurrentEmployee {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn admin_passes_all_checks() {
        let admin = employee(EmployeeRole::Admin);
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_self_or_admin(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn employee_may_only_act_on_self() {
        let me = employee(EmployeeRole::Employee);
        assert!(me.require_admin().is_err());
        assert!(me.require_self_or_admin(me.id).is_ok());
        assert!(me.require_self_or_admin(Uuid::new_v4()).is_err());
    }

    #[test]
    fn bearer_extraction_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def.ghi"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "bearer xyz".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("xyz"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic xyz".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
