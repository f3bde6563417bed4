//! Order, payment and payment webhook handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use shared::{Order, OrderStatus, PaginatedResponse};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::order::{CreateOrderInput, Invoice, OrderDetail, OrderFilter};
use crate::services::payment::{CheckoutResponse, WalletPaymentResponse, WebhookAck};
use crate::services::{OrderService, PaymentService};
use crate::AppState;

#[derive(Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

pub(crate) fn payment_service(state: &AppState) -> PaymentService {
    PaymentService::new(state.db.clone(), state.gateway.clone(), &state.config.payment)
}

pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    let service = OrderService::new(state.db.clone());
    let order = service.create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Own orders; staff and managers see all
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    let service = OrderService::new(state.db.clone());
    Ok(Json(service.list(&user, filter).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db.clone());
    Ok(Json(service.get_for(&user, order_id).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(state.db.clone());
    Ok(Json(service.cancel(&user, order_id).await?))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(body): Json<OrderStatusRequest>,
) -> AppResult<Json<Order>> {
    user.require_staff()?;
    let service = OrderService::new(state.db.clone());
    Ok(Json(service.update_status(order_id, body.status).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    let service = OrderService::new(state.db.clone());
    Ok(Json(service.invoice(&user, order_id).await?))
}

/// Start a hosted card checkout
pub async fn checkout_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<CheckoutResponse>> {
    let service = payment_service(&state);
    Ok(Json(service.checkout(&user, order_id).await?))
}

pub async fn pay_with_wallet(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<WalletPaymentResponse>> {
    let service = payment_service(&state);
    Ok(Json(service.pay_with_wallet(&user, order_id).await?))
}

/// Gateway webhook; the raw body is needed for signature verification
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    let service = payment_service(&state);
    Ok(Json(service.handle_webhook(signature, &body).await?))
}
