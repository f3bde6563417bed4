//! Warranties and repair requests

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{ClaimError, Repair, RepairStatus, Warranty, WarrantyStatus};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;

const WARRANTY_COLUMNS: &str = "id, order_id, product_id, user_id, start_date, end_date, \
                                status, terms, notes, created_at";
const REPAIR_COLUMNS: &str = "id, order_id, product_id, user_id, warranty_id, description, \
                              status, is_under_warranty, estimated_cost, final_cost, \
                              technician_notes, requested_at, completed_at";

#[derive(Clone)]
pub struct WarrantyService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimInput {
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRepairInput {
    pub order_id: Uuid,
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    pub estimated_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct RepairStatusInput {
    pub status: RepairStatus,
    pub final_cost: Option<Decimal>,
    pub technician_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarrantyCheck {
    pub warranty: Warranty,
    pub is_valid: bool,
    pub days_remaining: i64,
}

async fn lock_warranty(conn: &mut PgConnection, warranty_id: Uuid) -> AppResult<Warranty> {
    sqlx::query_as::<_, Warranty>(&format!(
        "SELECT {} FROM warranties WHERE id = $1 FOR UPDATE",
        WARRANTY_COLUMNS
    ))
    .bind(warranty_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Warranty".to_string()))
}

impl WarrantyService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Warranties
    // ------------------------------------------------------------------

    pub async fn list(&self, caller: &AuthUser) -> AppResult<Vec<Warranty>> {
        let owner = if caller.access().is_manager_or_admin() {
            None
        } else {
            Some(caller.user_id)
        };
        let warranties = sqlx::query_as::<_, Warranty>(&format!(
            "SELECT {} FROM warranties WHERE ($1::uuid IS NULL OR user_id = $1) \
             ORDER BY created_at DESC",
            WARRANTY_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        Ok(warranties)
    }

    pub async fn get(&self, caller: &AuthUser, warranty_id: Uuid) -> AppResult<Warranty> {
        let warranty = self.fetch(warranty_id).await?;
        caller.require_owner_or_manager(warranty.user_id)?;
        Ok(warranty)
    }

    /// Validity check for a single warranty
    pub async fn check(&self, caller: &AuthUser, warranty_id: Uuid) -> AppResult<WarrantyCheck> {
        let warranty = self.get(caller, warranty_id).await?;
        let today = Utc::now().date_naive();
        let is_valid = warranty.is_usable(today);
        let days_remaining = if is_valid {
            (warranty.end_date - today).num_days()
        } else {
            0
        };
        Ok(WarrantyCheck {
            warranty,
            is_valid,
            days_remaining,
        })
    }

    pub async fn active(&self, user_id: Uuid) -> AppResult<Vec<Warranty>> {
        let warranties = sqlx::query_as::<_, Warranty>(&format!(
            "SELECT {} FROM warranties \
             WHERE user_id = $1 AND status = 'ACTIVE' AND end_date >= $2 \
             ORDER BY end_date",
            WARRANTY_COLUMNS
        ))
        .bind(user_id)
        .bind(Utc::now().date_naive())
        .fetch_all(&self.db)
        .await?;
        Ok(warranties)
    }

    /// Claim a warranty; an expired one is marked EXPIRED and the claim fails
    pub async fn claim(
        &self,
        caller: &AuthUser,
        warranty_id: Uuid,
        input: ClaimInput,
    ) -> AppResult<Warranty> {
        let mut tx = self.db.begin().await?;
        let warranty = lock_warranty(&mut tx, warranty_id).await?;

        if warranty.user_id != caller.user_id {
            return Err(AppError::forbidden("only the warranty holder can claim it"));
        }

        if let Err(err) = warranty.check_claim(Utc::now().date_naive()) {
            if err == ClaimError::Expired {
                sqlx::query("UPDATE warranties SET status = $2 WHERE id = $1")
                    .bind(warranty_id)
                    .bind(WarrantyStatus::Expired)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                tracing::info!("Warranty {} expired on claim", warranty_id);
            }
            return Err(err.into());
        }

        let warranty = sqlx::query_as::<_, Warranty>(&format!(
            "UPDATE warranties SET status = $2, notes = $3 WHERE id = $1 RETURNING {}",
            WARRANTY_COLUMNS
        ))
        .bind(warranty_id)
        .bind(WarrantyStatus::Claimed)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Warranty {} claimed", warranty_id);
        Ok(warranty)
    }

    pub async fn void(&self, warranty_id: Uuid, input: ClaimInput) -> AppResult<Warranty> {
        let mut tx = self.db.begin().await?;
        let warranty = lock_warranty(&mut tx, warranty_id).await?;
        if !warranty.can_void() {
            return Err(AppError::InvalidStateTransition(format!(
                "warranty cannot move from {} to VOID",
                warranty.status.as_str()
            )));
        }

        let warranty = sqlx::query_as::<_, Warranty>(&format!(
            "UPDATE warranties SET status = $2, notes = $3 WHERE id = $1 RETURNING {}",
            WARRANTY_COLUMNS
        ))
        .bind(warranty_id)
        .bind(WarrantyStatus::Void)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!("Warranty {} voided", warranty_id);
        Ok(warranty)
    }

    async fn fetch(&self, warranty_id: Uuid) -> AppResult<Warranty> {
        sqlx::query_as::<_, Warranty>(&format!(
            "SELECT {} FROM warranties WHERE id = $1",
            WARRANTY_COLUMNS
        ))
        .bind(warranty_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Warranty".to_string()))
    }

    // ------------------------------------------------------------------
    // Repairs
    // ------------------------------------------------------------------

    pub async fn create_repair(
        &self,
        caller: &AuthUser,
        input: CreateRepairInput,
    ) -> AppResult<Repair> {
        input.validate()?;
        if matches!(input.estimated_cost, Some(cost) if cost < Decimal::ZERO) {
            return Err(AppError::Validation {
                field: "estimated_cost".to_string(),
                message: "Estimated cost cannot be negative".to_string(),
                message_es: "El costo estimado no puede ser negativo".to_string(),
            });
        }

        let owner = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM orders WHERE id = $1")
            .bind(input.order_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        if owner != caller.user_id {
            return Err(AppError::forbidden("repairs are requested by the buyer"));
        }

        let in_order = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM order_items WHERE order_id = $1 AND product_id = $2)",
        )
        .bind(input.order_id)
        .bind(input.product_id)
        .fetch_one(&self.db)
        .await?;
        if !in_order {
            return Err(AppError::ValidationError(
                "The product is not part of this order".to_string(),
            ));
        }

        let warranty = sqlx::query_as::<_, Warranty>(&format!(
            "SELECT {} FROM warranties WHERE order_id = $1 AND product_id = $2 \
             ORDER BY created_at DESC LIMIT 1",
            WARRANTY_COLUMNS
        ))
        .bind(input.order_id)
        .bind(input.product_id)
        .fetch_optional(&self.db)
        .await?;

        let today = Utc::now().date_naive();
        let under_warranty = warranty.as_ref().map_or(false, |w| w.is_usable(today));

        let repair = sqlx::query_as::<_, Repair>(&format!(
            r#"
            INSERT INTO repairs
                (order_id, product_id, user_id, warranty_id, description, is_under_warranty, estimated_cost)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            REPAIR_COLUMNS
        ))
        .bind(input.order_id)
        .bind(input.product_id)
        .bind(caller.user_id)
        .bind(warranty.as_ref().map(|w| w.id))
        .bind(&input.description)
        .bind(under_warranty)
        .bind(input.estimated_cost)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            "Repair {} requested (under warranty: {})",
            repair.id,
            repair.is_under_warranty
        );
        Ok(repair)
    }

    pub async fn list_repairs(&self, caller: &AuthUser) -> AppResult<Vec<Repair>> {
        let owner = if caller.access().is_manager_or_admin() {
            None
        } else {
            Some(caller.user_id)
        };
        let repairs = sqlx::query_as::<_, Repair>(&format!(
            "SELECT {} FROM repairs WHERE ($1::uuid IS NULL OR user_id = $1) \
             ORDER BY requested_at DESC",
            REPAIR_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        Ok(repairs)
    }

    pub async fn get_repair(&self, caller: &AuthUser, repair_id: Uuid) -> AppResult<Repair> {
        let repair = sqlx::query_as::<_, Repair>(&format!(
            "SELECT {} FROM repairs WHERE id = $1",
            REPAIR_COLUMNS
        ))
        .bind(repair_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Repair".to_string()))?;
        caller.require_owner_or_manager(repair.user_id)?;
        Ok(repair)
    }

    pub async fn update_repair_status(
        &self,
        repair_id: Uuid,
        input: RepairStatusInput,
    ) -> AppResult<Repair> {
        if matches!(input.final_cost, Some(cost) if cost < Decimal::ZERO) {
            return Err(AppError::Validation {
                field: "final_cost".to_string(),
                message: "Final cost cannot be negative".to_string(),
                message_es: "El costo final no puede ser negativo".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        let current = sqlx::query_scalar::<_, RepairStatus>(
            "SELECT status FROM repairs WHERE id = $1 FOR UPDATE",
        )
        .bind(repair_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Repair".to_string()))?;

        let next = current.transition_to(input.status)?;

        let repair = sqlx::query_as::<_, Repair>(&format!(
            r#"
            UPDATE repairs
            SET status = $2,
                final_cost = COALESCE($3, final_cost),
                technician_notes = COALESCE($4, technician_notes),
                completed_at = CASE WHEN $2 = 'COMPLETED'::repair_status THEN NOW() ELSE completed_at END
            WHERE id = $1
            RETURNING {}
            "#,
            REPAIR_COLUMNS
        ))
        .bind(repair_id)
        .bind(next)
        .bind(input.final_cost)
        .bind(input.technician_notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Repair {} moved {} -> {}", repair_id, current.as_str(), next.as_str());
        Ok(repair)
    }
}
