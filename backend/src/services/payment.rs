//! Payments: gateway checkout, wallet payments, webhooks and gateway refunds

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    order_reference, status_after_refund, to_cents, Order, OrderStatus, Payment, PaymentProvider,
    PaymentStatus, Refund, RefundStatus, WalletTransaction, WalletTransactionType,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::error::{AppError, AppResult};
use crate::external::payment_gateway::{
    verify_webhook_signature, CheckoutLine, CheckoutRequest, PaymentGatewayClient,
};
use crate::middleware::AuthUser;
use crate::services::order::transition_in_tx;
use crate::services::wallet::debit_in_tx;

const PAYMENT_COLUMNS: &str = "id, order_id, user_id, provider, checkout_session_id, \
                               payment_intent_id, amount, currency, status, created_at, updated_at";
const REFUND_COLUMNS: &str =
    "id, payment_id, return_id, amount, provider_refund_id, status, failure_reason, created_at";

#[derive(Clone)]
pub struct PaymentService {
    db: PgPool,
    gateway: PaymentGatewayClient,
    config: PaymentConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletPaymentResponse {
    pub order: Order,
    pub payment: Payment,
    pub transaction: WalletTransaction,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub event_type: String,
    pub handled: bool,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: SessionObject,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: SessionMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SessionMetadata {
    order_id: Option<String>,
}

async fn owned_pending_order(
    conn: &mut PgConnection,
    caller: &AuthUser,
    order_id: Uuid,
) -> AppResult<Order> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT id, user_id, status, total_price, shipping_address, phone, created_at, updated_at \
         FROM orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    if order.user_id != caller.user_id {
        return Err(AppError::forbidden("only the buyer can pay an order"));
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::InvalidStateTransition(format!(
            "order is {}, only PENDING orders can be paid",
            order.status
        )));
    }
    Ok(order)
}

impl PaymentService {
    pub fn new(db: PgPool, gateway: PaymentGatewayClient, config: &PaymentConfig) -> Self {
        Self {
            db,
            gateway,
            config: config.clone(),
        }
    }

    /// Open a hosted checkout session for a PENDING order
    pub async fn checkout(&self, caller: &AuthUser, order_id: Uuid) -> AppResult<CheckoutResponse> {
        let mut conn = self.db.acquire().await?;
        let order = owned_pending_order(&mut conn, caller, order_id).await?;
        drop(conn);

        let items = sqlx::query_as::<_, (String, Decimal, i32)>(
            "SELECT product_name, price, quantity FROM order_items WHERE order_id = $1",
        )
        .bind(order.id)
        .fetch_all(&self.db)
        .await?;

        let mut lines = Vec::with_capacity(items.len());
        for (name, price, quantity) in items {
            let unit_amount_cents = to_cents(price)
                .ok_or_else(|| AppError::ValidationError(format!("price of {} is too large", name)))?;
            lines.push(CheckoutLine {
                name,
                unit_amount_cents,
                quantity,
            });
        }

        let frontend = self.config.frontend_url.trim_end_matches('/');
        let request = CheckoutRequest {
            order_id: order.id.to_string(),
            currency: self.config.currency.clone(),
            lines,
            success_url: format!("{}/orders/{}?payment=success", frontend, order.id),
            cancel_url: format!("{}/orders/{}?payment=cancelled", frontend, order.id),
        };

        let session = self.gateway.create_checkout_session(&request).await?;

        sqlx::query(
            r#"
            INSERT INTO payments (order_id, user_id, provider, checkout_session_id, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(PaymentProvider::Stripe)
        .bind(&session.id)
        .bind(order.total_price)
        .bind(&self.config.currency)
        .bind(PaymentStatus::Pending)
        .execute(&self.db)
        .await?;

        tracing::info!("Checkout session {} opened for order {}", session.id, order.id);
        Ok(CheckoutResponse {
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    /// Pay a PENDING order from the buyer's wallet
    pub async fn pay_with_wallet(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
    ) -> AppResult<WalletPaymentResponse> {
        let mut tx = self.db.begin().await?;
        let order = owned_pending_order(&mut tx, caller, order_id).await?;

        let movement = debit_in_tx(
            &mut tx,
            order.user_id,
            order.total_price,
            WalletTransactionType::Purchase,
            &format!("Pago de orden {}", order.id),
            Some(&order_reference(order.id)),
        )
        .await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (order_id, user_id, provider, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(order.id)
        .bind(order.user_id)
        .bind(PaymentProvider::Wallet)
        .bind(order.total_price)
        .bind(&self.config.currency)
        .bind(PaymentStatus::Completed)
        .fetch_one(&mut *tx)
        .await?;

        let order = transition_in_tx(&mut tx, order.id, OrderStatus::Paid).await?;
        tx.commit().await?;

        Ok(WalletPaymentResponse {
            order,
            payment,
            transaction: movement.transaction,
        })
    }

    /// Verify and apply a gateway webhook
    pub async fn handle_webhook(&self, signature: &str, payload: &[u8]) -> AppResult<WebhookAck> {
        if !verify_webhook_signature(
            signature,
            payload,
            &self.config.webhook_secret,
            Utc::now().timestamp(),
            self.config.webhook_tolerance_secs,
        ) {
            tracing::warn!("Rejected webhook with invalid signature");
            return Err(AppError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| AppError::ValidationError(format!("malformed webhook payload: {}", e)))?;

        let handled = match event.event_type.as_str() {
            "checkout.session.completed" => self.complete_checkout(&event.data.object).await?,
            "checkout.session.expired" => self.expire_checkout(&event.data.object).await?,
            other => {
                tracing::info!("Ignoring webhook event {}", other);
                false
            }
        };

        Ok(WebhookAck {
            received: true,
            event_type: event.event_type,
            handled,
        })
    }

    async fn complete_checkout(&self, session: &SessionObject) -> AppResult<bool> {
        let Some(order_id) = session
            .metadata
            .order_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
        else {
            tracing::warn!("Checkout session {} carries no order id", session.id);
            return Ok(false);
        };

        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        match status {
            None => {
                tracing::warn!("Webhook for unknown order {}", order_id);
                return Ok(false);
            }
            Some(OrderStatus::Pending) => {}
            Some(other) => {
                tracing::info!("Order {} already {}, webhook ignored", order_id, other);
                return Ok(false);
            }
        }

        sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, payment_intent_id = COALESCE($3, payment_intent_id), updated_at = NOW()
            WHERE checkout_session_id = $1
            "#,
        )
        .bind(&session.id)
        .bind(PaymentStatus::Completed)
        .bind(&session.payment_intent)
        .execute(&mut *tx)
        .await?;

        transition_in_tx(&mut tx, order_id, OrderStatus::Paid).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn expire_checkout(&self, session: &SessionObject) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, updated_at = NOW() \
             WHERE checkout_session_id = $1 AND status = $3",
        )
        .bind(&session.id)
        .bind(PaymentStatus::Failed)
        .bind(PaymentStatus::Pending)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One refund attempt through the gateway for a return. Gateway failures
    /// are recorded as a FAILED refund row rather than returned as errors.
    pub async fn refund_through_gateway(
        &self,
        order_id: Uuid,
        return_id: Uuid,
        amount: Decimal,
    ) -> AppResult<Option<Refund>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments \
             WHERE order_id = $1 AND provider = $2 AND payment_intent_id IS NOT NULL \
             ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        ))
        .bind(order_id)
        .bind(PaymentProvider::Stripe)
        .fetch_optional(&self.db)
        .await?;
        let Some(payment) = payment else {
            tracing::warn!(
                "Order {} has no card payment; refund for return {} needs manual follow-up",
                order_id,
                return_id
            );
            return Ok(None);
        };

        let outcome = match (&payment.payment_intent_id, to_cents(amount)) {
            _ if !payment.status.is_refundable() => Err(format!(
                "payment is {:?} and cannot be refunded",
                payment.status
            )),
            (Some(intent), Some(cents)) => self
                .gateway
                .create_refund(intent, cents)
                .await
                .map_err(|e| e.to_string()),
            (None, _) => Err("payment has no payment intent".to_string()),
            (_, None) => Err("refund amount out of range".to_string()),
        };

        let (status, provider_refund_id, failure_reason) = match outcome {
            Ok(refund) => (RefundStatus::from_gateway(&refund.status), Some(refund.id), None),
            Err(reason) => {
                tracing::warn!("Gateway refund for return {} failed: {}", return_id, reason);
                (RefundStatus::Failed, None, Some(reason))
            }
        };

        let mut tx = self.db.begin().await?;
        let refund = sqlx::query_as::<_, Refund>(&format!(
            r#"
            INSERT INTO refunds (payment_id, return_id, amount, provider_refund_id, status, failure_reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            REFUND_COLUMNS
        ))
        .bind(payment.id)
        .bind(return_id)
        .bind(amount)
        .bind(&provider_refund_id)
        .bind(status)
        .bind(&failure_reason)
        .fetch_one(&mut *tx)
        .await?;

        if status.is_effective() {
            let refunded = sqlx::query_scalar::<_, Decimal>(
                "SELECT COALESCE(SUM(amount), 0) FROM refunds \
                 WHERE payment_id = $1 AND status IN ('PENDING', 'PROCESSING', 'SUCCEEDED')",
            )
            .bind(payment.id)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query("UPDATE payments SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(payment.id)
                .bind(status_after_refund(payment.amount, refunded))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(Some(refund))
    }
}
