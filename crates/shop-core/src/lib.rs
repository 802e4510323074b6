//! # shop-core
//!
//! Domain model and persistence seams for the clothing storefront.
//!
//! ## Aggregates
//!
//! ```text
//! ┌──────────────┐      ┌──────────────┐      ┌──────────────┐
//! │   Product    │      │     Cart     │      │     User     │
//! │  sizes[]     │ copy │  products[]  │◀─────│  cart        │
//! │  externalSync│─────▶│  (snapshots) │      │  receipts[]  │
//! └──────────────┘      └──────────────┘      └──────────────┘
//! ```
//!
//! Line items are copied from a product when added and never follow later
//! product edits. Receipts are append-only.

pub mod error;
pub mod model;
pub mod store;

pub use error::{Result, ShopError};
pub use model::{
    receipt_id_from_url, to_minor_units, Cart, CartId, CartLineItem, ExternalPrice, ExternalSync,
    Product, ProductId, Receipt, Size, SizeId, User, UserId, DEFAULT_CURRENCY,
};
pub use store::{
    CartStore, CatalogStore, MemoryCartStore, MemoryCatalogStore, MemoryUserStore, PriceAnnotation,
    ProfileUpdate, UserStore,
};
