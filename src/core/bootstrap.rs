//! First-run bootstrap: make sure at least one admin account exists, since
//! every employee-management endpoint requires one.

use diesel::prelude::*;

use crate::core::shared::schema::employees;
use crate::core::shared::utils::DbPool;
use crate::employees::{create_employee_record, CreateEmployeeRequest};

pub fn ensure_default_admin(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;

    let count: i64 = employees::table.count().get_result(&mut conn)?;
    if count > 0 {
        return Ok(());
    }

    let email =
        std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@crm.local".to_string());
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

    let req = CreateEmployeeRequest {
        first_name: Some("Admin".to_string()),
        last_name: Some("User".to_string()),
        email: Some(email.clone()),
        password: Some(password),
        location: None,
        preferred_language: None,
        phone: None,
        department: Some("Management".to_string()),
        role: Some(crate::core::shared::enums::EmployeeRole::Admin),
    };
    create_employee_record(&mut conn, req)
        .map_err(|e| anyhow::anyhow!("failed to create default admin: {e}"))?;

    tracing::warn!(email, "created default admin account; change its password");
    Ok(())
}
