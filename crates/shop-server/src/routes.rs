//! Router

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{cart, catalog, checkout, health_check, users};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let users = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/verify", get(users::verify))
        .route("/update", put(users::update));

    let clothes = Router::new()
        .route("/sizes", post(catalog::create_size).get(catalog::list_sizes))
        .route("/create-cloth", post(catalog::create_cloth))
        .route("/get-all-clothes", get(catalog::list_clothes))
        .route("/get-cloth/{id}", get(catalog::get_cloth))
        .route("/update-cloth/{id}", put(catalog::update_cloth))
        .route("/delete-cloth/{id}", delete(catalog::delete_cloth));

    let checkout = Router::new()
        .route("/create-checkout-session", get(checkout::create_checkout_session))
        .route("/create-order", post(checkout::stripe_webhook))
        .route("/create-order-from-items", post(checkout::create_order_from_items))
        .route("/create-cart", post(cart::create_cart))
        .route("/get-cart", get(cart::get_cart))
        .route("/edit-cart", put(cart::edit_cart));

    Router::new()
        .route("/health", get(health_check))
        .nest("/users", users)
        .nest("/clothes", clothes)
        .nest("/checkout", checkout)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
