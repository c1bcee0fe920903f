//! Credential exchange and self-service account operations.

use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap};
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::activity::ActivityEntry;
use crate::config::AuthConfig;
use crate::core::error::ApiError;
use crate::core::middleware::CurrentEmployee;
use crate::core::shared::enums::{ActivityAction, EmployeeStatus, EntityType};
use crate::core::shared::schema::employees;
use crate::core::shared::state::AppState;
use crate::core::shared::ApiResponse;
use crate::employees::{
    create_employee_record, CreateEmployeeRequest, Employee, PublicEmployee,
};
use crate::leads::{lead_summaries_for, LeadSummary};
use crate::security::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};

/// JWT claims: subject employee id plus issue/expiry timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(employee_id: Uuid, config: &AuthConfig) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: employee_id,
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.jwt_expiry_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Decode and validate a bearer token. An expired token is reported
/// distinctly from a malformed one.
pub fn decode_token(token: &str, config: &AuthConfig) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ApiError::Unauthorized("Token expired".to_string())
        }
        _ => ApiError::Unauthorized("Invalid token".to_string()),
    })
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub employee: PublicEmployee,
    pub token: String,
}

fn client_details(addr: &SocketAddr, headers: &HeaderMap) -> serde_json::Value {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    serde_json::json!({
        "ipAddress": addr.ip().to_string(),
        "userAgent": user_agent,
    })
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let mut conn = state.conn.get()?;
    let employee: Option<Employee> = employees::table
        .filter(employees::email.eq(req.email.trim().to_lowercase()))
        .first(&mut conn)
        .optional()?;

    let Some(employee) = employee else {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    };

    if employee.status != EmployeeStatus::Active {
        return Err(ApiError::Unauthorized(
            "Account is inactive. Please contact administrator.".to_string(),
        ));
    }

    if !verify_password(&req.password, &employee.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let now = Utc::now();
    diesel::update(employees::table.filter(employees::id.eq(employee.id)))
        .set((
            employees::last_login.eq(Some(now)),
            employees::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let token = issue_token(employee.id, &state.config.auth)?;

    state.activity.record(
        ActivityEntry::new(
            employee.id,
            ActivityAction::Login,
            EntityType::Auth,
            format!("{} {} logged in", employee.first_name, employee.last_name),
        )
        .details(client_details(&addr, &headers)),
    );

    let mut public = PublicEmployee::from(employee);
    public.last_login = Some(now);

    Ok(Json(ApiResponse::ok_with_message(
        LoginResponse {
            employee: public,
            token,
        },
        "Login successful",
    )))
}

/// Admin-only registration; same record creation path as POST /api/employees.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Json(req): Json<CreateEmployeeRequest>,
) -> Result<Json<ApiResponse<PublicEmployee>>, ApiError> {
    current.require_admin()?;

    let mut conn = state.conn.get()?;
    let employee = create_employee_record(&mut conn, req)?;

    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::EmployeeCreated,
            EntityType::Employee,
            format!(
                "{} created new employee {} {}",
                current.full_name(),
                employee.first_name,
                employee.last_name
            ),
        )
        .entity(employee.id)
        .details(serde_json::json!({
            "role": employee.role,
            "department": employee.department,
        })),
    );

    Ok(Json(ApiResponse::ok_with_message(
        PublicEmployee::from(employee),
        "Employee registered successfully",
    )))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub employee: PublicEmployee,
    pub assigned_leads: Vec<LeadSummary>,
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let mut conn = state.conn.get()?;
    let employee: Employee = employees::table
        .filter(employees::id.eq(current.id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Employee"))?;

    let assigned_leads = lead_summaries_for(&mut conn, current.id)?;

    Ok(Json(ApiResponse::ok(ProfileResponse {
        employee: PublicEmployee::from(employee),
        assigned_leads,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub location: Option<String>,
    pub preferred_language: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<PublicEmployee>>, ApiError> {
    let mut conn = state.conn.get()?;
    let mut employee: Employee = employees::table
        .filter(employees::id.eq(current.id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Employee"))?;

    if let Some(first_name) = req.first_name {
        employee.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        employee.last_name = last_name;
    }
    if let Some(location) = req.location {
        employee.location = Some(location);
    }
    if let Some(preferred_language) = req.preferred_language {
        employee.preferred_language = preferred_language;
    }
    if let Some(phone) = req.phone {
        employee.phone = Some(phone);
    }
    if let Some(department) = req.department {
        employee.department = department;
    }
    employee.updated_at = Utc::now();

    diesel::update(employees::table.filter(employees::id.eq(employee.id)))
        .set(&employee)
        .execute(&mut conn)?;

    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::EmployeeUpdated,
            EntityType::Employee,
            format!("{} updated their profile", current.full_name()),
        )
        .entity(current.id),
    );

    Ok(Json(ApiResponse::ok_with_message(
        PublicEmployee::from(employee),
        "Profile updated successfully",
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::BadRequest(
            "Current password and new password are required".to_string(),
        ));
    }
    if req.new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "New password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }

    let mut conn = state.conn.get()?;
    let employee: Employee = employees::table
        .filter(employees::id.eq(current.id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Employee"))?;

    if !verify_password(&req.current_password, &employee.password_hash) {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password(&req.new_password)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    diesel::update(employees::table.filter(employees::id.eq(current.id)))
        .set((
            employees::password_hash.eq(new_hash),
            employees::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

    Ok(Json(ApiResponse::message("Password changed successfully")))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentEmployee>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.activity.record(
        ActivityEntry::new(
            current.id,
            ActivityAction::Logout,
            EntityType::Auth,
            format!("{} logged out", current.full_name()),
        )
        .details(client_details(&addr, &headers)),
    );

    Ok(Json(ApiResponse::message("Logout successful")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: crate::core::shared::enums::EmployeeRole,
}

pub async fn verify(
    Extension(current): Extension<CurrentEmployee>,
) -> Json<ApiResponse<VerifyResponse>> {
    Json(ApiResponse::ok_with_message(
        VerifyResponse {
            id: current.id,
            first_name: current.first_name.clone(),
            last_name: current.last_name.clone(),
            email: current.email.clone(),
            role: current.role,
        },
        "Token is valid",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(expiry_hours: i64) -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expiry_hours: expiry_hours,
        }
    }

    #[test]
    fn issued_token_round_trips() {
        let cfg = config(24);
        let id = Uuid::new_v4();
        let token = issue_token(id, &cfg).unwrap();
        let claims = decode_token(&token, &cfg).unwrap();
        assert_eq!(claims.sub, id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_distinct_from_malformed() {
        let cfg = config(24);

        // Forge an already-expired token.
        let past = Utc::now() - Duration::hours(48);
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: past.timestamp(),
            exp: (past + Duration::hours(24)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        )
        .unwrap();

        match decode_token(&token, &cfg) {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("expected expired-token error, got {other:?}"),
        }

        match decode_token("garbage.token.here", &cfg) {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "Invalid token"),
            other => panic!("expected invalid-token error, got {other:?}"),
        }
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let id = Uuid::new_v4();
        let token = issue_token(id, &config(24)).unwrap();
        let other = AuthConfig {
            jwt_secret: "different-secret".to_string(),
            jwt_expiry_hours: 24,
        };
        assert!(decode_token(&token, &other).is_err());
    }
}
