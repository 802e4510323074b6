//! Store Abstractions
//!
//! Persistence seams for catalog, carts and accounts. Implement these for a
//! real database; the in-memory versions back development and tests.

mod memory;

pub use memory::{MemoryCartStore, MemoryCatalogStore, MemoryUserStore};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Cart, CartId, CartLineItem, Product, ProductId, Receipt, Size, SizeId, User, UserId};

/// Catalog storage (products and sizes)
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_size(&self, size: Size) -> Result<Size>;

    async fn list_sizes(&self) -> Result<Vec<Size>>;

    async fn get_size(&self, id: &SizeId) -> Result<Option<Size>>;

    async fn insert_product(&self, product: Product) -> Result<Product>;

    /// All products, oldest first
    async fn list_products(&self) -> Result<Vec<Product>>;

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Replace a stored product. Fails with `NotFound` if it does not exist.
    async fn save_product(&self, product: Product) -> Result<Product>;

    /// Remove a product, returning it if it existed
    async fn delete_product(&self, id: &ProductId) -> Result<Option<Product>>;
}

/// A provider price resolved for the line item at `index`. Applied only while
/// the stored item still equals `snapshot`.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceAnnotation {
    pub index: usize,
    pub snapshot: CartLineItem,
    pub price_id: String,
}

/// Profile fields an account holder may change. `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    /// Already hashed
    pub password_hash: Option<String>,
    pub age: Option<u32>,
}

/// Cart storage
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn insert(&self, cart: Cart) -> Result<Cart>;

    async fn get(&self, id: &CartId) -> Result<Option<Cart>>;

    /// Replace the full line-item list; `None` if the cart does not exist
    async fn replace_items(&self, id: &CartId, items: Vec<CartLineItem>) -> Result<Option<Cart>>;

    /// Set `externalPriceId` on each annotated item that is unchanged since
    /// its snapshot was taken. Returns how many were applied, or `None` if the
    /// cart does not exist.
    async fn annotate_prices(&self, id: &CartId, prices: &[PriceAnnotation]) -> Result<Option<usize>>;
}

/// Account storage
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account. Fails with `Conflict` on a taken username.
    async fn insert(&self, user: User) -> Result<User>;

    async fn get(&self, id: &UserId) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Change only the given profile fields, leaving cart and receipts
    /// untouched. `Conflict` on a username held by another account; `None` if
    /// the account does not exist.
    async fn update_profile(&self, id: &UserId, update: ProfileUpdate) -> Result<Option<User>>;

    /// Point the account at a cart; `None` if the account does not exist
    async fn set_cart(&self, id: &UserId, cart: &CartId) -> Result<Option<User>>;

    /// Append a receipt to the first account with this email, atomically.
    /// Returns the updated account, or `None` when no account matches.
    async fn append_receipt(&self, email: &str, receipt: Receipt) -> Result<Option<User>>;
}
