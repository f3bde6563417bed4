//! Natural-language cart handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::cart::{CartCommandResponse, SuggestionsResponse};
use crate::services::CartService;
use crate::AppState;

#[derive(Deserialize)]
pub struct CartPromptRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
}

/// 201 when the command placed an order, 200 when it was only interpreted
pub async fn add_natural_language(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CartPromptRequest>,
) -> AppResult<(StatusCode, Json<CartCommandResponse>)> {
    let service = CartService::new(state.db.clone());
    let response = service.apply_command(user.user_id, &body.prompt).await?;
    let status = if response.order.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

pub async fn cart_suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionQuery>,
) -> AppResult<Json<SuggestionsResponse>> {
    let service = CartService::new(state.db.clone());
    Ok(Json(service.suggestions(&query.q).await?))
}
