//! User account management

use serde::Deserialize;
use shared::{validate_email, PaginatedResponse, Pagination, Role, UserProfile};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{unique_violation, AppError, AppResult};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, role, is_staff, \
                            is_active, date_joined, last_login";

#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleInput {
    pub role: Option<Role>,
    pub is_staff: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, user_id: Uuid) -> AppResult<UserProfile> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    pub async fn list(&self, filter: UserFilter) -> AppResult<PaginatedResponse<UserProfile>> {
        let pagination = Pagination::new(filter.page, filter.per_page);
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let where_clause = "WHERE ($1::user_role IS NULL OR role = $1) \
             AND ($2::text IS NULL OR LOWER(username) LIKE $2 OR LOWER(email) LIKE $2 \
                  OR LOWER(first_name || ' ' || last_name) LIKE $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM users {}",
            where_clause
        ))
        .bind(filter.role)
        .bind(&search)
        .fetch_one(&self.db)
        .await?;

        let users = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {} FROM users {} ORDER BY date_joined DESC LIMIT $3 OFFSET $4",
            USER_COLUMNS, where_clause
        ))
        .bind(filter.role)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(users, &pagination, total.max(0) as u64))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> AppResult<UserProfile> {
        if let Some(email) = input.email.as_deref() {
            validate_email(email).map_err(|msg| AppError::Validation {
                field: "email".to_string(),
                message: msg.to_string(),
                message_es: "Formato de correo inválido".to_string(),
            })?;
        }

        sqlx::query_as::<_, UserProfile>(&format!(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| unique_violation(e, "email"))?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Assign or clear a role. Omitting `is_staff` leaves the flag unchanged.
    pub async fn set_role(&self, user_id: Uuid, input: SetRoleInput) -> AppResult<UserProfile> {
        let user = sqlx::query_as::<_, UserProfile>(&format!(
            "UPDATE users SET role = $2, is_staff = COALESCE($3, is_staff) \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(input.role)
        .bind(input.is_staff)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        tracing::info!(
            "User {} role set to {:?} (staff: {})",
            user.id,
            user.role,
            user.is_staff
        );
        Ok(user)
    }

    /// Soft-delete: the account stays for order history but can no longer log in
    pub async fn deactivate(&self, user_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("UPDATE users SET is_active = false WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }

        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("User {} deactivated", user_id);
        Ok(())
    }
}
