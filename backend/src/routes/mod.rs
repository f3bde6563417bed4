//! Route definitions for the shop platform

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{
    handlers,
    middleware::{auth_middleware, optional_auth_middleware},
    AppState,
};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::api_health))
        // Auth routes (public token endpoints, protected logout)
        .nest("/auth", auth_routes(state.clone()))
        // Payment gateway callbacks (public, signature checked)
        .route("/webhooks/payment", post(handlers::payment_webhook))
        // Catalog (public reads, staff writes)
        .nest("/categories", category_routes(state.clone()))
        .nest("/products", product_routes(state.clone()))
        // Natural-language cart (public suggestions, protected commands)
        .nest("/cart", cart_routes(state.clone()))
        // Protected routes
        .merge(protected_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/token", post(handlers::login))
        .route("/token/refresh", post(handlers::refresh))
        .route(
            "/logout",
            post(handlers::logout)
                .route_layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
}

fn cart_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/suggestions", get(handlers::cart_suggestions))
        .route(
            "/add-natural-language",
            post(handlers::add_natural_language)
                .route_layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
}

fn category_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/:category_id",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route_layer(middleware::from_fn_with_state(state, optional_auth_middleware))
}

fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route(
            "/:product_id/reviews",
            get(handlers::list_reviews).post(handlers::create_review),
        )
        .route_layer(middleware::from_fn_with_state(state, optional_auth_middleware))
}

/// Everything that needs a bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .route("/reviews/:review_id", delete(handlers::delete_review))
        .nest("/orders", order_routes())
        .nest("/wallets", wallet_routes())
        .nest("/returns", return_routes())
        .nest("/delivery-zones", zone_routes())
        .nest("/delivery-profiles", courier_routes())
        .nest("/deliveries", delivery_routes())
        .nest("/warranties", warranty_routes())
        .nest("/repairs", repair_routes())
        .nest("/audit-logs", audit_routes())
        .nest("/reports", report_routes())
        .route("/predictions/sales", get(handlers::predict_sales))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users))
        .route(
            "/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route(
            "/:user_id",
            get(handlers::get_user).delete(handlers::deactivate_user),
        )
        .route("/:user_id/role", put(handlers::set_user_role))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/cancel", post(handlers::cancel_order))
        .route("/:order_id/status", put(handlers::update_order_status))
        .route("/:order_id/checkout", post(handlers::checkout_order))
        .route("/:order_id/pay-with-wallet", post(handlers::pay_with_wallet))
        .route("/:order_id/invoice", get(handlers::get_invoice))
}

fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_wallets))
        .route("/me", get(handlers::my_wallet))
        .route("/me/balance", get(handlers::my_balance))
        .route("/me/transactions", get(handlers::my_transactions))
        .route("/me/statistics", get(handlers::my_statistics))
        .route("/deposit", post(handlers::deposit))
        .route("/withdraw", post(handlers::withdraw))
        .route("/:wallet_id/transactions", get(handlers::wallet_transactions))
}

fn return_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_returns).post(handlers::create_return))
        .route("/:return_id", get(handlers::get_return))
        .route(
            "/:return_id/send-to-evaluation",
            post(handlers::send_to_evaluation),
        )
        .route("/:return_id/approve", post(handlers::approve_return))
        .route("/:return_id/reject", post(handlers::reject_return))
        .route("/:return_id/complete", post(handlers::complete_return))
}

fn zone_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_zones).post(handlers::create_zone))
        .route(
            "/:zone_id",
            get(handlers::get_zone)
                .put(handlers::update_zone)
                .delete(handlers::delete_zone),
        )
}

fn courier_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_profile))
        .route("/me", get(handlers::my_profile))
        .route("/available", get(handlers::available_profiles))
        .route("/:profile_id/status", post(handlers::set_profile_status))
}

fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_deliveries).post(handlers::create_delivery),
        )
        .route("/mine", get(handlers::my_deliveries))
        .route("/:delivery_id", get(handlers::get_delivery))
        .route("/:delivery_id/assign", post(handlers::assign_delivery))
        .route("/:delivery_id/status", post(handlers::update_delivery_status))
}

fn warranty_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_warranties))
        .route("/active", get(handlers::active_warranties))
        .route("/:warranty_id", get(handlers::get_warranty))
        .route("/:warranty_id/check", get(handlers::check_warranty))
        .route("/:warranty_id/claim", post(handlers::claim_warranty))
        .route("/:warranty_id/void", post(handlers::void_warranty))
}

fn repair_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_repairs).post(handlers::create_repair))
        .route("/:repair_id", get(handlers::get_repair))
        .route("/:repair_id/status", post(handlers::update_repair_status))
}

fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_audit_logs))
        .route("/statistics", get(handlers::audit_statistics))
        .route("/export", get(handlers::export_audit_logs))
        .route("/:log_id", get(handlers::get_audit_log))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/sales", get(handlers::sales_report))
        .route("/products", get(handlers::products_report))
        .route("/dynamic", post(handlers::run_dynamic_report))
        .route("/dynamic/parse", post(handlers::parse_dynamic_report))
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/sales-analytics", get(handlers::sales_analytics))
}
