//! Domain Model
//!
//! Catalog products, carts and user accounts. Line items, receipts and
//! external price lists are owned sequences embedded in their parent record,
//! the way a document store keeps them.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ShopError};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// User account identifier
    UserId
);
record_id!(
    /// Cart identifier (its storage key)
    CartId
);
record_id!(
    /// Catalog product identifier
    ProductId
);
record_id!(
    /// Size identifier
    SizeId
);

/// Default currency for catalog products and created prices
pub const DEFAULT_CURRENCY: &str = "usd";

/// Convert a decimal amount in currency units into minor units (cents).
///
/// Halves round away from zero. Returns `None` when the amount does not fit.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

// ============================================================================
// Catalog
// ============================================================================

/// A clothing size
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub id: SizeId,
    pub name: String,
}

impl Size {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SizeId::new(),
            name: name.into(),
        }
    }
}

/// Price registered with the payment provider for one size
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPrice {
    pub external_price_id: String,
    pub size_id: SizeId,
    pub price: Decimal,
}

/// Link between a catalog product and the provider's product/price objects
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSync {
    pub external_product_id: String,
    #[serde(default)]
    pub prices: Vec<ExternalPrice>,
}

impl ExternalSync {
    /// Exactly one external price per size reference, and none for other sizes.
    pub fn covers(&self, sizes: &[SizeId]) -> bool {
        self.prices.len() == sizes.len()
            && sizes.iter().all(|size| {
                self.prices.iter().filter(|p| &p.size_id == size).count() == 1
            })
    }
}

/// A catalog product
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Image references
    pub img: Vec<String>,
    /// Size references
    pub sizes: Vec<SizeId>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub external_sync: Option<ExternalSync>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            currency: DEFAULT_CURRENCY.into(),
            description: None,
            img: Vec::new(),
            sizes: Vec::new(),
            category: None,
            external_sync: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the record-level invariants
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ShopError::validation("product name is required"));
        }
        if self.price.is_sign_negative() {
            return Err(ShopError::validation("product price cannot be negative"));
        }
        if self.img.is_empty() {
            return Err(ShopError::validation("at least one image is required"));
        }
        if self.currency.trim().is_empty() {
            return Err(ShopError::validation("currency is required"));
        }
        if let Some(sync) = &self.external_sync {
            if !sync.covers(&self.sizes) {
                return Err(ShopError::validation(
                    "externalSync must hold exactly one price per size",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Cart
// ============================================================================

const fn default_quantity() -> u32 {
    1
}

/// One cart entry. A value snapshot: it does not follow later product edits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub name: String,
    /// Unit price in currency units
    pub price: Decimal,
    pub size_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Set once the provider price has been resolved
    #[serde(default)]
    pub external_price_id: Option<String>,
}

impl CartLineItem {
    pub fn validate(&self) -> Result<()> {
        if self.quantity < 1 {
            return Err(ShopError::validation(format!(
                "quantity for '{}' must be at least 1",
                self.name
            )));
        }
        if self.name.trim().is_empty() {
            return Err(ShopError::validation("line item name is required"));
        }
        if self.price.is_sign_negative() {
            return Err(ShopError::validation(format!(
                "price for '{}' cannot be negative",
                self.name
            )));
        }
        if self.unit_amount_minor().is_none() {
            return Err(ShopError::validation(format!(
                "price for '{}' is out of range",
                self.name
            )));
        }
        Ok(())
    }

    /// Resolved provider price id, if any
    pub fn resolved_price(&self) -> Option<&str> {
        self.external_price_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn unit_amount_minor(&self) -> Option<i64> {
        to_minor_units(self.price)
    }
}

/// An ordered list of line items. Identity is the storage key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    #[serde(default)]
    pub products: Vec<CartLineItem>,
}

impl Cart {
    pub fn new(products: Vec<CartLineItem>) -> Self {
        Self {
            id: CartId::new(),
            products,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.products.iter().try_for_each(CartLineItem::validate)
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Locally persisted record of a completed charge. Never updated once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(rename = "receiptURL")]
    pub receipt_url: String,
    #[serde(rename = "receiptID")]
    pub receipt_id: String,
    /// Epoch seconds
    pub date_created: i64,
    /// Minor currency units
    pub amount: i64,
}

impl Receipt {
    /// Build a receipt, deriving its id from the URL's last path segment
    pub fn from_charge(receipt_url: impl Into<String>, amount: i64, date_created: i64) -> Option<Self> {
        let receipt_url = receipt_url.into();
        let receipt_id = receipt_id_from_url(&receipt_url)?;
        Some(Self {
            receipt_url,
            receipt_id,
            date_created,
            amount,
        })
    }
}

/// Last non-empty path segment of a receipt URL (query and fragment ignored).
pub fn receipt_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// A user account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Argon2 PHC string; never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(default)]
    pub genre: Option<String>,
    pub age: u32,
    #[serde(default)]
    pub cart: Option<CartId>,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>, age: u32) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            username: username.into(),
            email: None,
            password_hash: password_hash.into(),
            genre: None,
            age,
            cart: None,
            receipts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
