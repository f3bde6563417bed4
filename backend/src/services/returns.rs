//! Returns and refunds
//!
//! A customer requests a return for a delivered order line; a manager moves
//! it to evaluation and then approves or rejects it. Approval dispatches the
//! refund by the chosen method.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    compute_refund_amount, return_reference, returnable_quantity, validate_quantity,
    OrderStatus, ProductReturn, Refund, RefundMethod, ReturnReason, ReturnStatus,
    WalletTransaction, WalletTransactionType,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::notification::{ReturnEvent, ReturnNotifier};
use crate::services::payment::PaymentService;
use crate::services::wallet::credit_in_tx;

const RETURN_COLUMNS: &str = "id, order_id, product_id, user_id, quantity, reason, description, \
                              status, refund_method, refund_amount, manager_notes, \
                              evaluation_notes, requested_at, evaluated_at, processed_at, \
                              completed_at";

#[derive(Clone)]
pub struct ReturnService {
    db: PgPool,
    payments: PaymentService,
    notifier: ReturnNotifier,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReturnInput {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub reason: ReturnReason,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub refund_method: RefundMethod,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesInput {
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveInput {
    #[serde(default)]
    pub evaluation_notes: String,
    pub refund_amount: Option<Decimal>,
    pub refund_method: Option<RefundMethod>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnFilter {
    pub status: Option<ReturnStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApproveResponse {
    #[serde(rename = "return")]
    pub product_return: ProductReturn,
    /// Whether the money actually moved during approval
    pub refund_dispatched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_transaction: Option<WalletTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<Refund>,
}

async fn lock_return(conn: &mut PgConnection, return_id: Uuid) -> AppResult<ProductReturn> {
    sqlx::query_as::<_, ProductReturn>(&format!(
        "SELECT {} FROM returns WHERE id = $1 FOR UPDATE",
        RETURN_COLUMNS
    ))
    .bind(return_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Return".to_string()))
}

/// Purchase-time unit price of the returned product on its order
async fn unit_price(conn: &mut PgConnection, ret: &ProductReturn) -> AppResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT price FROM order_items WHERE order_id = $1 AND product_id = $2 LIMIT 1",
    )
    .bind(ret.order_id)
    .bind(ret.product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Order item".to_string()))
}

impl ReturnService {
    pub fn new(db: PgPool, payments: PaymentService, notifier: ReturnNotifier) -> Self {
        Self {
            db,
            payments,
            notifier,
        }
    }

    pub async fn create(
        &self,
        caller: &AuthUser,
        input: CreateReturnInput,
    ) -> AppResult<ProductReturn> {
        input.validate()?;
        validate_quantity(input.quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
            message_es: "La cantidad debe ser mayor que cero".to_string(),
        })?;

        let mut tx = self.db.begin().await?;

        let order = sqlx::query_as::<_, (Uuid, OrderStatus)>(
            "SELECT user_id, status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(input.order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let (owner_id, status) = order;
        if owner_id != caller.user_id {
            return Err(AppError::forbidden("returns are requested by the buyer"));
        }
        if status != OrderStatus::Delivered {
            return Err(AppError::ValidationError(format!(
                "Only delivered orders can be returned (order is {})",
                status
            )));
        }

        let ordered = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT SUM(quantity) FROM order_items WHERE order_id = $1 AND product_id = $2",
        )
        .bind(input.order_id)
        .bind(input.product_id)
        .fetch_one(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::ValidationError("The product is not part of this order".to_string())
        })?;

        let already = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0) FROM returns \
             WHERE order_id = $1 AND product_id = $2 AND status <> 'REJECTED'",
        )
        .bind(input.order_id)
        .bind(input.product_id)
        .fetch_one(&mut *tx)
        .await?;

        let available = returnable_quantity(
            i32::try_from(ordered).unwrap_or(i32::MAX),
            i32::try_from(already).unwrap_or(i32::MAX),
        );
        if input.quantity > available {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: format!(
                    "Only {} unit(s) of this product can still be returned",
                    available
                ),
                message_es: format!("Solo se pueden devolver {} unidad(es)", available),
            });
        }

        let ret = sqlx::query_as::<_, ProductReturn>(&format!(
            r#"
            INSERT INTO returns (order_id, product_id, user_id, quantity, reason, description, refund_method)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            RETURN_COLUMNS
        ))
        .bind(input.order_id)
        .bind(input.product_id)
        .bind(caller.user_id)
        .bind(input.quantity)
        .bind(input.reason)
        .bind(&input.description)
        .bind(input.refund_method)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Return {} requested for order {}", ret.id, ret.order_id);
        self.notifier.notify(ReturnEvent::Requested, &ret).await;
        Ok(ret)
    }

    pub async fn list(
        &self,
        caller: &AuthUser,
        filter: ReturnFilter,
    ) -> AppResult<Vec<ProductReturn>> {
        let owner = if caller.access().is_manager_or_admin() {
            None
        } else {
            Some(caller.user_id)
        };

        let returns = sqlx::query_as::<_, ProductReturn>(&format!(
            "SELECT {} FROM returns \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
               AND ($2::return_status IS NULL OR status = $2) \
             ORDER BY requested_at DESC",
            RETURN_COLUMNS
        ))
        .bind(owner)
        .bind(filter.status)
        .fetch_all(&self.db)
        .await?;
        Ok(returns)
    }

    pub async fn get(&self, caller: &AuthUser, return_id: Uuid) -> AppResult<ProductReturn> {
        let ret = sqlx::query_as::<_, ProductReturn>(&format!(
            "SELECT {} FROM returns WHERE id = $1",
            RETURN_COLUMNS
        ))
        .bind(return_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Return".to_string()))?;

        caller.require_owner_or_manager(ret.user_id)?;
        Ok(ret)
    }

    pub async fn send_to_evaluation(
        &self,
        return_id: Uuid,
        input: NotesInput,
    ) -> AppResult<ProductReturn> {
        let mut tx = self.db.begin().await?;
        let ret = lock_return(&mut tx, return_id).await?;
        let next = ret.status.transition_to(ReturnStatus::InEvaluation)?;

        let ret = sqlx::query_as::<_, ProductReturn>(&format!(
            "UPDATE returns SET status = $2, manager_notes = $3, evaluated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            RETURN_COLUMNS
        ))
        .bind(return_id)
        .bind(next)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Return {} sent to evaluation", return_id);
        self.notifier.notify(ReturnEvent::EvaluationStarted, &ret).await;
        Ok(ret)
    }

    /// Approve a return and dispatch its refund
    pub async fn approve(&self, return_id: Uuid, input: ApproveInput) -> AppResult<ApproveResponse> {
        let response = self.approve_and_dispatch(return_id, input).await?;
        self.notifier
            .notify(ReturnEvent::Approved, &response.product_return)
            .await;
        Ok(response)
    }

    async fn approve_and_dispatch(
        &self,
        return_id: Uuid,
        input: ApproveInput,
    ) -> AppResult<ApproveResponse> {
        let mut tx = self.db.begin().await?;
        let ret = lock_return(&mut tx, return_id).await?;
        ret.status.transition_to(ReturnStatus::Approved)?;

        let price = unit_price(&mut tx, &ret).await?;
        let amount = compute_refund_amount(price, ret.quantity, input.refund_amount)?;
        let method = input.refund_method.unwrap_or(ret.refund_method);

        let approved = sqlx::query_as::<_, ProductReturn>(&format!(
            r#"
            UPDATE returns
            SET status = $2, evaluation_notes = $3, refund_amount = $4, refund_method = $5,
                processed_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RETURN_COLUMNS
        ))
        .bind(return_id)
        .bind(ReturnStatus::Approved)
        .bind(&input.evaluation_notes)
        .bind(amount)
        .bind(method)
        .fetch_one(&mut *tx)
        .await?;

        match method {
            RefundMethod::Wallet => {
                let movement = credit_in_tx(
                    &mut tx,
                    approved.user_id,
                    amount,
                    WalletTransactionType::Refund,
                    &format!("Reembolso por devolución {}", approved.id),
                    Some(&return_reference(approved.id)),
                )
                .await?;
                let completed = Self::mark_completed(&mut tx, return_id).await?;
                tx.commit().await?;

                tracing::info!("Return {} refunded {} to wallet", return_id, amount);
                Ok(ApproveResponse {
                    product_return: completed,
                    refund_dispatched: true,
                    wallet_transaction: Some(movement.transaction),
                    refund: None,
                })
            }
            RefundMethod::Original => {
                // Commit the approval before calling out to the gateway
                tx.commit().await?;

                let refund = match self
                    .payments
                    .refund_through_gateway(approved.order_id, approved.id, amount)
                    .await
                {
                    Ok(refund) => refund,
                    Err(e) => {
                        tracing::warn!("Refund for return {} not dispatched: {}", return_id, e);
                        None
                    }
                };
                let dispatched = refund.as_ref().is_some_and(|r| r.status.is_effective());

                let product_return = if method.status_after_dispatch(dispatched)
                    == ReturnStatus::Completed
                {
                    let mut tx = self.db.begin().await?;
                    let completed = Self::mark_completed(&mut tx, return_id).await?;
                    tx.commit().await?;
                    completed
                } else {
                    approved
                };

                Ok(ApproveResponse {
                    product_return,
                    refund_dispatched: dispatched,
                    wallet_transaction: None,
                    refund,
                })
            }
            RefundMethod::Bank => {
                tx.commit().await?;
                tracing::info!("Return {} approved for bank transfer", return_id);
                Ok(ApproveResponse {
                    product_return: approved,
                    refund_dispatched: false,
                    wallet_transaction: None,
                    refund: None,
                })
            }
        }
    }

    pub async fn reject(&self, return_id: Uuid, input: NotesInput) -> AppResult<ProductReturn> {
        if input.notes.trim().is_empty() {
            return Err(AppError::Validation {
                field: "notes".to_string(),
                message: "A reason is required to reject a return".to_string(),
                message_es: "Debe indicar el motivo del rechazo".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        let ret = lock_return(&mut tx, return_id).await?;
        let next = ret.status.transition_to(ReturnStatus::Rejected)?;

        let ret = sqlx::query_as::<_, ProductReturn>(&format!(
            "UPDATE returns SET status = $2, evaluation_notes = $3, processed_at = NOW() \
             WHERE id = $1 RETURNING {}",
            RETURN_COLUMNS
        ))
        .bind(return_id)
        .bind(next)
        .bind(input.notes.trim())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Return {} rejected", return_id);
        self.notifier.notify(ReturnEvent::Rejected, &ret).await;
        Ok(ret)
    }

    /// Close an APPROVED return whose refund was settled outside the system
    pub async fn complete(&self, return_id: Uuid) -> AppResult<ProductReturn> {
        let mut tx = self.db.begin().await?;
        let ret = lock_return(&mut tx, return_id).await?;
        ret.status.transition_to(ReturnStatus::Completed)?;
        let completed = Self::mark_completed(&mut tx, return_id).await?;
        tx.commit().await?;
        Ok(completed)
    }

    async fn mark_completed(conn: &mut PgConnection, return_id: Uuid) -> AppResult<ProductReturn> {
        let ret = sqlx::query_as::<_, ProductReturn>(&format!(
            "UPDATE returns SET status = $2, completed_at = NOW() WHERE id = $1 RETURNING {}",
            RETURN_COLUMNS
        ))
        .bind(return_id)
        .bind(ReturnStatus::Completed)
        .fetch_one(&mut *conn)
        .await?;
        Ok(ret)
    }
}
