//! In-memory Stores
//!
//! For development and tests. Records live behind `tokio::sync::RwLock`s and
//! listings keep insertion order.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CartStore, CatalogStore, PriceAnnotation, ProfileUpdate, UserStore};
use crate::error::{Result, ShopError};
use crate::model::{Cart, CartId, CartLineItem, Product, ProductId, Receipt, Size, SizeId, User, UserId};

/// In-memory catalog
#[derive(Default)]
pub struct MemoryCatalogStore {
    sizes: RwLock<Vec<Size>>,
    products: RwLock<Vec<Product>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn insert_size(&self, size: Size) -> Result<Size> {
        let mut sizes = self.sizes.write().await;
        if sizes.iter().any(|s| s.id == size.id) {
            return Err(ShopError::Conflict(format!("size {} already exists", size.id)));
        }
        sizes.push(size.clone());
        Ok(size)
    }

    async fn list_sizes(&self) -> Result<Vec<Size>> {
        Ok(self.sizes.read().await.clone())
    }

    async fn get_size(&self, id: &SizeId) -> Result<Option<Size>> {
        Ok(self.sizes.read().await.iter().find(|s| &s.id == id).cloned())
    }

    async fn insert_product(&self, product: Product) -> Result<Product> {
        let mut products = self.products.write().await;
        if products.iter().any(|p| p.id == product.id) {
            return Err(ShopError::Conflict(format!("product {} already exists", product.id)));
        }
        products.push(product.clone());
        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.read().await.clone())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.iter().find(|p| &p.id == id).cloned())
    }

    async fn save_product(&self, product: Product) -> Result<Product> {
        let mut products = self.products.write().await;
        let slot = products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| ShopError::not_found("Product", &product.id))?;
        *slot = product.clone();
        Ok(product)
    }

    async fn delete_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let mut products = self.products.write().await;
        Ok(products
            .iter()
            .position(|p| &p.id == id)
            .map(|index| products.remove(index)))
    }
}

/// In-memory carts
#[derive(Default)]
pub struct MemoryCartStore {
    carts: RwLock<HashMap<CartId, Cart>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn insert(&self, cart: Cart) -> Result<Cart> {
        let mut carts = self.carts.write().await;
        if carts.contains_key(&cart.id) {
            return Err(ShopError::Conflict(format!("cart {} already exists", cart.id)));
        }
        carts.insert(cart.id.clone(), cart.clone());
        Ok(cart)
    }

    async fn get(&self, id: &CartId) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(id).cloned())
    }

    async fn replace_items(&self, id: &CartId, items: Vec<CartLineItem>) -> Result<Option<Cart>> {
        let mut carts = self.carts.write().await;
        Ok(carts.get_mut(id).map(|cart| {
            cart.products = items;
            cart.clone()
        }))
    }

    async fn annotate_prices(&self, id: &CartId, prices: &[PriceAnnotation]) -> Result<Option<usize>> {
        let mut carts = self.carts.write().await;
        let Some(cart) = carts.get_mut(id) else {
            return Ok(None);
        };

        let mut applied = 0;
        for annotation in prices {
            if let Some(item) = cart.products.get_mut(annotation.index) {
                if *item == annotation.snapshot {
                    item.external_price_id = Some(annotation.price_id.clone());
                    applied += 1;
                }
            }
        }
        Ok(Some(applied))
    }
}

/// In-memory accounts
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == user.username) {
            return Err(ShopError::Conflict(format!(
                "username '{}' is already taken",
                user.username
            )));
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn get(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| &u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update_profile(&self, id: &UserId, update: ProfileUpdate) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(username) = &update.username {
            if users.iter().any(|u| &u.username == username && &u.id != id) {
                return Err(ShopError::Conflict(format!(
                    "username '{username}' is already taken"
                )));
            }
        }

        Ok(users.iter_mut().find(|u| &u.id == id).map(|user| {
            if let Some(username) = update.username {
                user.username = username;
            }
            if let Some(password_hash) = update.password_hash {
                user.password_hash = password_hash;
            }
            if let Some(age) = update.age {
                user.age = age;
            }
            user.touch();
            user.clone()
        }))
    }

    async fn set_cart(&self, id: &UserId, cart: &CartId) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| &u.id == id).map(|user| {
            user.cart = Some(cart.clone());
            user.touch();
            user.clone()
        }))
    }

    async fn append_receipt(&self, email: &str, receipt: Receipt) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users
            .iter_mut()
            .find(|u| u.email.as_deref() == Some(email))
            .map(|user| {
                user.receipts.push(receipt);
                user.touch();
                user.clone()
            }))
    }
}
