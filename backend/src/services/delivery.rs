//! Delivery zones, courier profiles and delivery tracking

use serde::Deserialize;
use shared::{
    CourierStatus, Delivery, DeliveryProfile, DeliveryStatus, DeliveryZone, OrderStatus,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{unique_violation, AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::order::transition_in_tx;

const ZONE_COLUMNS: &str = "id, name, description, is_active, created_at";
const PROFILE_COLUMNS: &str =
    "id, user_id, zone_id, status, vehicle_type, license_plate, phone, is_active, created_at";
const DELIVERY_COLUMNS: &str = "id, order_id, delivery_person_id, zone_id, status, \
                                delivery_address, customer_phone, notes, assigned_at, \
                                picked_up_at, delivered_at, created_at";

#[derive(Clone)]
pub struct DeliveryService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ZoneInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfileInput {
    pub user_id: Uuid,
    pub zone_id: Option<Uuid>,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub vehicle_type: String,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub license_plate: String,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct CourierStatusInput {
    pub status: CourierStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeliveryInput {
    pub order_id: Uuid,
    pub zone_id: Option<Uuid>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignInput {
    pub delivery_person_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryStatusInput {
    pub status: DeliveryStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MineFilter {
    #[serde(default)]
    pub include_finished: bool,
}

async fn profile_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Option<DeliveryProfile>> {
    let profile = sqlx::query_as::<_, DeliveryProfile>(&format!(
        "SELECT {} FROM delivery_profiles WHERE user_id = $1",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(profile)
}

async fn set_courier_status(
    conn: &mut PgConnection,
    profile_id: Uuid,
    status: CourierStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE delivery_profiles SET status = $2 WHERE id = $1")
        .bind(profile_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl DeliveryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Zones
    // ------------------------------------------------------------------

    pub async fn list_zones(&self) -> AppResult<Vec<DeliveryZone>> {
        let zones = sqlx::query_as::<_, DeliveryZone>(&format!(
            "SELECT {} FROM delivery_zones ORDER BY name",
            ZONE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(zones)
    }

    pub async fn get_zone(&self, zone_id: Uuid) -> AppResult<DeliveryZone> {
        sqlx::query_as::<_, DeliveryZone>(&format!(
            "SELECT {} FROM delivery_zones WHERE id = $1",
            ZONE_COLUMNS
        ))
        .bind(zone_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery zone".to_string()))
    }

    pub async fn create_zone(&self, input: ZoneInput) -> AppResult<DeliveryZone> {
        input.validate()?;
        let zone = sqlx::query_as::<_, DeliveryZone>(&format!(
            "INSERT INTO delivery_zones (name, description, is_active) VALUES ($1, $2, $3) \
             RETURNING {}",
            ZONE_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.is_active)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_violation(e, "name"))?;
        Ok(zone)
    }

    pub async fn update_zone(&self, zone_id: Uuid, input: ZoneInput) -> AppResult<DeliveryZone> {
        input.validate()?;
        sqlx::query_as::<_, DeliveryZone>(&format!(
            "UPDATE delivery_zones SET name = $2, description = $3, is_active = $4 \
             WHERE id = $1 RETURNING {}",
            ZONE_COLUMNS
        ))
        .bind(zone_id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| unique_violation(e, "name"))?
        .ok_or_else(|| AppError::NotFound("Delivery zone".to_string()))
    }

    pub async fn delete_zone(&self, zone_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM delivery_zones WHERE id = $1")
            .bind(zone_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Delivery zone".to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Courier profiles
    // ------------------------------------------------------------------

    pub async fn create_profile(&self, input: CreateProfileInput) -> AppResult<DeliveryProfile> {
        input.validate()?;

        let user_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(input.user_id)
                .fetch_one(&self.db)
                .await?;
        if !user_exists {
            return Err(AppError::NotFound("User".to_string()));
        }

        let profile = sqlx::query_as::<_, DeliveryProfile>(&format!(
            r#"
            INSERT INTO delivery_profiles (user_id, zone_id, vehicle_type, license_plate, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(input.user_id)
        .bind(input.zone_id)
        .bind(&input.vehicle_type)
        .bind(&input.license_plate)
        .bind(&input.phone)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_violation(e, "user_id"))?;

        tracing::info!("Courier profile {} created for user {}", profile.id, profile.user_id);
        Ok(profile)
    }

    pub async fn my_profile(&self, user_id: Uuid) -> AppResult<DeliveryProfile> {
        let mut conn = self.db.acquire().await?;
        profile_for_user(&mut conn, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Delivery profile".to_string()))
    }

    pub async fn available_profiles(&self) -> AppResult<Vec<DeliveryProfile>> {
        let profiles = sqlx::query_as::<_, DeliveryProfile>(&format!(
            "SELECT {} FROM delivery_profiles \
             WHERE is_active AND status = 'AVAILABLE' ORDER BY created_at",
            PROFILE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(profiles)
    }

    /// Couriers change their own availability; managers change anyone's
    pub async fn set_profile_status(
        &self,
        caller: &AuthUser,
        profile_id: Uuid,
        input: CourierStatusInput,
    ) -> AppResult<DeliveryProfile> {
        let profile = sqlx::query_as::<_, DeliveryProfile>(&format!(
            "SELECT {} FROM delivery_profiles WHERE id = $1",
            PROFILE_COLUMNS
        ))
        .bind(profile_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery profile".to_string()))?;

        caller.require_owner_or_manager(profile.user_id)?;

        let profile = sqlx::query_as::<_, DeliveryProfile>(&format!(
            "UPDATE delivery_profiles SET status = $2 WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(profile_id)
        .bind(input.status)
        .fetch_one(&self.db)
        .await?;
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Deliveries
    // ------------------------------------------------------------------

    pub async fn list(&self, caller: &AuthUser) -> AppResult<Vec<Delivery>> {
        if caller.access().is_manager_or_admin() {
            let deliveries = sqlx::query_as::<_, Delivery>(&format!(
                "SELECT {} FROM deliveries ORDER BY created_at DESC",
                DELIVERY_COLUMNS
            ))
            .fetch_all(&self.db)
            .await?;
            return Ok(deliveries);
        }
        if !caller.access().is_delivery() {
            return Err(AppError::forbidden("deliveries are visible to couriers and managers"));
        }
        self.mine(caller, MineFilter { include_finished: true }).await
    }

    pub async fn create(&self, input: CreateDeliveryInput) -> AppResult<Delivery> {
        let order = sqlx::query_as::<_, (String, String, OrderStatus)>(
            "SELECT shipping_address, phone, status FROM orders WHERE id = $1",
        )
        .bind(input.order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let (address, phone, status) = order;
        if status == OrderStatus::Cancelled {
            return Err(AppError::ValidationError(
                "Cancelled orders cannot be delivered".to_string(),
            ));
        }

        let delivery = sqlx::query_as::<_, Delivery>(&format!(
            r#"
            INSERT INTO deliveries (order_id, zone_id, delivery_address, customer_phone, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(input.order_id)
        .bind(input.zone_id)
        .bind(&address)
        .bind(&phone)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_violation(e, "order_id"))?;

        tracing::info!("Delivery {} opened for order {}", delivery.id, delivery.order_id);
        Ok(delivery)
    }

    pub async fn get(&self, caller: &AuthUser, delivery_id: Uuid) -> AppResult<Delivery> {
        let delivery = sqlx::query_as::<_, Delivery>(&format!(
            "SELECT {} FROM deliveries WHERE id = $1",
            DELIVERY_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery".to_string()))?;

        if caller.access().is_manager_or_admin() {
            return Ok(delivery);
        }
        let mut conn = self.db.acquire().await?;
        let is_courier = match profile_for_user(&mut conn, caller.user_id).await? {
            Some(profile) => delivery.delivery_person_id == Some(profile.id),
            None => false,
        };
        let is_customer = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1 AND user_id = $2)",
        )
        .bind(delivery.order_id)
        .bind(caller.user_id)
        .fetch_one(&mut *conn)
        .await?;

        if is_courier || is_customer {
            Ok(delivery)
        } else {
            Err(AppError::forbidden("not your delivery"))
        }
    }

    /// Hand a PENDING delivery to a courier
    pub async fn assign(&self, delivery_id: Uuid, input: AssignInput) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;

        let delivery = sqlx::query_as::<_, Delivery>(&format!(
            "SELECT {} FROM deliveries WHERE id = $1 FOR UPDATE",
            DELIVERY_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery".to_string()))?;
        let next = delivery.status.transition_to(DeliveryStatus::Assigned)?;

        let courier = sqlx::query_as::<_, DeliveryProfile>(&format!(
            "SELECT {} FROM delivery_profiles WHERE id = $1 FOR UPDATE",
            PROFILE_COLUMNS
        ))
        .bind(input.delivery_person_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery profile".to_string()))?;

        if !courier.can_take_delivery() {
            return Err(AppError::Validation {
                field: "delivery_person_id".to_string(),
                message: "The courier is offline or inactive".to_string(),
                message_es: "El repartidor no está disponible".to_string(),
            });
        }

        let delivery = sqlx::query_as::<_, Delivery>(&format!(
            r#"
            UPDATE deliveries
            SET delivery_person_id = $2, zone_id = COALESCE($3, zone_id), status = $4,
                assigned_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(delivery_id)
        .bind(courier.id)
        .bind(courier.zone_id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        set_courier_status(&mut tx, courier.id, CourierStatus::Busy).await?;
        tx.commit().await?;

        tracing::info!("Delivery {} assigned to courier {}", delivery_id, courier.id);
        Ok(delivery)
    }

    /// Deliveries assigned to the calling courier
    pub async fn mine(&self, caller: &AuthUser, filter: MineFilter) -> AppResult<Vec<Delivery>> {
        let mut conn = self.db.acquire().await?;
        let profile = profile_for_user(&mut conn, caller.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Delivery profile".to_string()))?;

        let deliveries = sqlx::query_as::<_, Delivery>(&format!(
            "SELECT {} FROM deliveries \
             WHERE delivery_person_id = $1 \
               AND ($2 OR status NOT IN ('DELIVERED', 'FAILED')) \
             ORDER BY assigned_at DESC NULLS LAST",
            DELIVERY_COLUMNS
        ))
        .bind(profile.id)
        .bind(filter.include_finished)
        .fetch_all(&mut *conn)
        .await?;
        Ok(deliveries)
    }

    /// Advance a delivery; finishing it frees the courier and a successful
    /// drop-off also marks the order DELIVERED
    pub async fn update_status(
        &self,
        caller: &AuthUser,
        delivery_id: Uuid,
        input: DeliveryStatusInput,
    ) -> AppResult<Delivery> {
        let mut tx = self.db.begin().await?;

        let delivery = sqlx::query_as::<_, Delivery>(&format!(
            "SELECT {} FROM deliveries WHERE id = $1 FOR UPDATE",
            DELIVERY_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery".to_string()))?;

        if !caller.access().is_manager_or_admin() {
            let own = profile_for_user(&mut tx, caller.user_id).await?;
            let assigned = matches!(
                (own, delivery.delivery_person_id),
                (Some(profile), Some(assigned)) if profile.id == assigned
            );
            if !assigned {
                return Err(AppError::forbidden("only the assigned courier"));
            }
        }

        let next = delivery.status.transition_to(input.status)?;

        let delivery = sqlx::query_as::<_, Delivery>(&format!(
            r#"
            UPDATE deliveries
            SET status = $2,
                notes = COALESCE($3, notes),
                picked_up_at = CASE WHEN $2 = 'PICKED_UP'::delivery_status THEN NOW() ELSE picked_up_at END,
                delivered_at = CASE WHEN $2 = 'DELIVERED'::delivery_status THEN NOW() ELSE delivered_at END
            WHERE id = $1
            RETURNING {}
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(delivery_id)
        .bind(next)
        .bind(input.notes.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        if next == DeliveryStatus::Delivered {
            let order_status =
                sqlx::query_scalar::<_, OrderStatus>("SELECT status FROM orders WHERE id = $1")
                    .bind(delivery.order_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if order_status.can_transition_to(OrderStatus::Delivered) {
                transition_in_tx(&mut tx, delivery.order_id, OrderStatus::Delivered).await?;
            }
        }

        if next.releases_courier() {
            if let Some(courier_id) = delivery.delivery_person_id {
                set_courier_status(&mut tx, courier_id, CourierStatus::Available).await?;
            }
        }

        tx.commit().await?;
        tracing::info!("Delivery {} is now {}", delivery_id, next);
        Ok(delivery)
    }
}
