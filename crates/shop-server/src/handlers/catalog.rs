//! Catalog handlers (sizes and clothes)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::{ExternalSync, Product, ProductId, ShopError, Size, SizeId};

use super::Envelope;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSizeRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClothRequest {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub img: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<SizeId>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub external_sync: Option<ExternalSync>,
}

/// Partial update; absent fields are left as they are
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClothRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub img: Option<Vec<String>>,
    pub sizes: Option<Vec<SizeId>>,
    pub category: Option<String>,
    pub external_sync: Option<ExternalSync>,
}

#[derive(Debug, Serialize)]
pub struct SizeData {
    pub size: Size,
}

#[derive(Debug, Serialize)]
pub struct SizesData {
    pub sizes: Vec<Size>,
}

#[derive(Debug, Serialize)]
pub struct ClothData {
    pub cloth: Product,
}

#[derive(Debug, Serialize)]
pub struct ClothesData {
    pub clothes: Vec<Product>,
}

async fn ensure_sizes_exist(state: &AppState, sizes: &[SizeId]) -> Result<(), ApiError> {
    for size in sizes {
        if state.catalog.get_size(size).await?.is_none() {
            return Err(ShopError::validation(format!("unknown size {size}")).into());
        }
    }
    Ok(())
}

async fn find_product(state: &AppState, id: &str) -> Result<Product, ApiError> {
    let id = ProductId::from_string(id);
    Ok(state
        .catalog
        .get_product(&id)
        .await?
        .ok_or_else(|| ShopError::not_found("Product", &id))?)
}

pub async fn create_size(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateSizeRequest>,
) -> Result<(StatusCode, Json<Envelope<SizeData>>), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("size name is required".into()));
    }
    let size = state.catalog.insert_size(Size::new(payload.name.trim())).await?;
    Ok((StatusCode::CREATED, Envelope::ok(SizeData { size })))
}

pub async fn list_sizes(State(state): State<AppState>) -> Result<Json<Envelope<SizesData>>, ApiError> {
    let sizes = state.catalog.list_sizes().await?;
    Ok(Envelope::ok(SizesData { sizes }))
}

pub async fn create_cloth(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateClothRequest>,
) -> Result<(StatusCode, Json<Envelope<ClothData>>), ApiError> {
    let mut product = Product::new(payload.name, payload.price);
    if let Some(currency) = payload.currency {
        product.currency = currency.to_ascii_lowercase();
    }
    product.description = payload.description;
    product.img = payload.img;
    product.sizes = payload.sizes;
    product.category = payload.category;
    product.external_sync = payload.external_sync;

    product.validate()?;
    ensure_sizes_exist(&state, &product.sizes).await?;

    let cloth = state.catalog.insert_product(product).await?;
    tracing::info!(product_id = %cloth.id, name = %cloth.name, "Created product");

    Ok((StatusCode::CREATED, Envelope::ok(ClothData { cloth })))
}

pub async fn list_clothes(State(state): State<AppState>) -> Result<Json<Envelope<ClothesData>>, ApiError> {
    let clothes = state.catalog.list_products().await?;
    Ok(Envelope::ok(ClothesData { clothes }))
}

pub async fn get_cloth(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ClothData>>, ApiError> {
    let cloth = find_product(&state, &id).await?;
    Ok(Envelope::ok(ClothData { cloth }))
}

pub async fn update_cloth(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateClothRequest>,
) -> Result<Json<Envelope<ClothData>>, ApiError> {
    let mut product = find_product(&state, &id).await?;

    if let Some(name) = payload.name {
        product.name = name;
    }
    if let Some(price) = payload.price {
        product.price = price;
    }
    if let Some(currency) = payload.currency {
        product.currency = currency.to_ascii_lowercase();
    }
    if let Some(description) = payload.description {
        product.description = Some(description);
    }
    if let Some(img) = payload.img {
        product.img = img;
    }
    if let Some(sizes) = payload.sizes {
        product.sizes = sizes;
    }
    if let Some(category) = payload.category {
        product.category = Some(category);
    }
    if let Some(sync) = payload.external_sync {
        product.external_sync = Some(sync);
    }

    product.validate()?;
    ensure_sizes_exist(&state, &product.sizes).await?;

    product.updated_at = chrono::Utc::now();
    let cloth = state.catalog.save_product(product).await?;
    tracing::info!(product_id = %cloth.id, "Updated product");

    Ok(Envelope::ok(ClothData { cloth }))
}

pub async fn delete_cloth(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ClothData>>, ApiError> {
    let id = ProductId::from_string(id);
    let cloth = state
        .catalog
        .delete_product(&id)
        .await?
        .ok_or_else(|| ShopError::not_found("Product", &id))?;

    tracing::info!(product_id = %cloth.id, "Deleted product");
    Ok(Envelope::ok(ClothData { cloth }))
}
