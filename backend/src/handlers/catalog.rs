//! Catalog handlers: categories, products and reviews

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::{Category, PaginatedResponse, Review};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::catalog::{
    CategoryInput, CreateProductInput, CreateReviewInput, ProductFilter, ProductRemoval,
    ProductView, UpdateProductInput,
};
use crate::services::CatalogService;
use crate::AppState;

#[derive(Serialize)]
pub struct ProductDeleteResponse {
    pub result: ProductRemoval,
}

/// Staff see inactive products too
fn sees_inactive(user: &Option<CurrentUser>) -> bool {
    user.as_ref()
        .map_or(false, |CurrentUser(u)| u.access().is_staff_user())
}

// ----------------------------------------------------------------------
// Categories
// ----------------------------------------------------------------------

pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    let service = CatalogService::new(state.db.clone());
    Ok(Json(service.list_categories().await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    let service = CatalogService::new(state.db.clone());
    Ok(Json(service.get_category(category_id).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    user.require_staff()?;
    let service = CatalogService::new(state.db.clone());
    Ok((StatusCode::CREATED, Json(service.create_category(input).await?)))
}

pub async fn update_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(category_id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    user.require_staff()?;
    let service = CatalogService::new(state.db.clone());
    Ok(Json(service.update_category(category_id, input).await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(category_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_staff()?;
    let service = CatalogService::new(state.db.clone());
    service.delete_category(category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Products
// ----------------------------------------------------------------------

pub async fn list_products(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<PaginatedResponse<ProductView>>> {
    let service = CatalogService::new(state.db.clone());
    Ok(Json(service.list_products(filter, sees_inactive(&user)).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductView>> {
    let service = CatalogService::new(state.db.clone());
    Ok(Json(service.get_product(product_id, sees_inactive(&user)).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<ProductView>)> {
    user.require_staff()?;
    let service = CatalogService::new(state.db.clone());
    Ok((StatusCode::CREATED, Json(service.create_product(input).await?)))
}

pub async fn update_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<ProductView>> {
    user.require_staff()?;
    let service = CatalogService::new(state.db.clone());
    Ok(Json(service.update_product(product_id, input).await?))
}

/// Products referenced by orders are only deactivated
pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductDeleteResponse>> {
    user.require_staff()?;
    let service = CatalogService::new(state.db.clone());
    let result = service.delete_product(product_id).await?;
    Ok(Json(ProductDeleteResponse { result }))
}

// ----------------------------------------------------------------------
// Reviews
// ----------------------------------------------------------------------

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<Review>>> {
    let service = CatalogService::new(state.db.clone());
    Ok(Json(service.list_reviews(product_id).await?))
}

pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<CreateReviewInput>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let service = CatalogService::new(state.db.clone());
    let review = service.create_review(user.user_id, product_id, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(review_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.db.clone());
    let review = service.get_review(review_id).await?;
    if review.user_id != user.user_id {
        user.require_staff()?;
    }
    service.delete_review(review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
