//! Route definitions for the Recycling Network Ledger

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - catalog
        .route(
            "/categories",
            get(handlers::list_categories)
                .post(handlers::create_category)
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .nest("/materials", material_routes(state))
        .nest("/partners", partner_routes(state))
        .route(
            "/buyers",
            get(handlers::list_buyers).route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Protected routes - stock projection
        .nest("/stock", stock_routes(state))
        // Protected routes - movement ledger
        .nest("/receipts", receipt_routes(state))
        .nest("/purchases", purchase_routes(state))
        .nest("/sales", sale_routes(state))
        .nest("/movements", movement_routes(state))
        // Protected routes - reports
        .nest("/reports", report_routes(state))
        // Protected routes - cash book
        .nest("/cash", cash_routes(state))
}

fn material_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_materials).post(handlers::create_material),
        )
        .route(
            "/:id",
            get(handlers::get_material)
                .put(handlers::update_material)
                .delete(handlers::deactivate_material),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn partner_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_partners).post(handlers::create_partner),
        )
        .route(
            "/:id",
            get(handlers::get_partner)
                .put(handlers::update_partner)
                .delete(handlers::deactivate_partner),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn stock_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock))
        .route("/:material_id", get(handlers::get_stock))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn receipt_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_receipts).post(handlers::create_receipt),
        )
        .route("/:id", get(handlers::get_receipt))
        .route("/:id/cancel", post(handlers::cancel_receipt))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn purchase_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchases).post(handlers::create_purchase),
        )
        .route("/:id", get(handlers::get_purchase))
        .route("/:id/cancel", post(handlers::cancel_purchase))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn sale_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/:id", get(handlers::get_sale))
        .route("/:id/cancel", post(handlers::cancel_sale))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn movement_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/:id/cancel", post(handlers::cancel_movement))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn report_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/summary", get(handlers::get_summary_report))
        .route("/by-material", get(handlers::get_material_report))
        .route("/by-partner", get(handlers::get_partner_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn cash_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/balance", get(handlers::get_cash_balance))
        .route(
            "/transactions",
            get(handlers::list_cash_transactions).post(handlers::create_cash_transaction),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
