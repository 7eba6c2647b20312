//! # Product Catalog Contract
//!
//! Owner-curated listing of products: key → stock and unit price.
//!
//! Only the owner may list or delist. Stock only ever goes down through
//! [`ProductCatalog::decrement_stock`], which the store calls while settling
//! a purchase; it never underflows.

use cosmo_protocol::config::{MAX_PRODUCT_KEY_LEN, STATUS_OK};
use cosmo_protocol::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::config::{PricingPolicy, RestockPolicy};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during catalog operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unauthorized: only the store owner can {0}")]
    Unauthorized(&'static str),

    #[error("product not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient stock for '{key}': requested {requested}, available {available}")]
    InsufficientStock {
        key: String,
        requested: u64,
        available: u64,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Catalog key: 1..=32 printable ASCII characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductKey(String);

impl ProductKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, CatalogError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "product key must not be empty".into(),
            ));
        }
        if raw.len() > MAX_PRODUCT_KEY_LEN {
            return Err(CatalogError::InvalidArgument(format!(
                "product key is {} chars, maximum is {}",
                raw.len(),
                MAX_PRODUCT_KEY_LEN
            )));
        }
        if !raw.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
            return Err(CatalogError::InvalidArgument(
                "product key must be printable ASCII".into(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProductKey {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductKey> for String {
    fn from(key: ProductKey) -> Self {
        key.0
    }
}

/// A listed product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub stock: u64,
    /// Settlement-currency units per item.
    pub unit_price: u64,
}

/// Parses an unsigned integer argument as it arrives over a text boundary.
///
/// Accepts plain decimal (`"50"`) and the Clarity literal form (`"u50"`).
/// Anything else, including signs and whitespace, is `InvalidArgument`.
pub fn parse_uint(field: &str, raw: &str) -> Result<u64, CatalogError> {
    let digits = raw.strip_prefix('u').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CatalogError::InvalidArgument(format!(
            "{field} must be a non-negative integer, got {raw:?}"
        )));
    }
    digits.parse().map_err(|_| {
        CatalogError::InvalidArgument(format!("{field} does not fit in 64 bits: {raw:?}"))
    })
}

// ---------------------------------------------------------------------------
// ProductCatalog
// ---------------------------------------------------------------------------

/// The store's product listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCatalog {
    owner: Principal,
    pricing: PricingPolicy,
    restock: RestockPolicy,
    products: BTreeMap<ProductKey, Product>,
}

impl ProductCatalog {
    pub fn new(owner: Principal, pricing: PricingPolicy, restock: RestockPolicy) -> Self {
        Self {
            owner,
            pricing,
            restock,
            products: BTreeMap::new(),
        }
    }

    /// Lists `key`, or updates its listing according to the restock policy.
    ///
    /// Returns [`STATUS_OK`].
    ///
    /// # Errors
    ///
    /// [`CatalogError::Unauthorized`] unless `caller` is the owner;
    /// [`CatalogError::InvalidArgument`] if accumulated stock would overflow.
    pub fn add_product(
        &mut self,
        caller: &Principal,
        key: &ProductKey,
        quantity: u64,
        unit_price: u64,
    ) -> Result<u64, CatalogError> {
        self.require_owner(caller, "add products")?;

        let stock = match (self.restock, self.products.get(key)) {
            (RestockPolicy::Accumulate, Some(existing)) => {
                existing.stock.checked_add(quantity).ok_or_else(|| {
                    CatalogError::InvalidArgument(format!("stock for '{key}' would overflow"))
                })?
            }
            _ => quantity,
        };
        self.products
            .insert(key.clone(), Product { stock, unit_price });
        Ok(STATUS_OK)
    }

    /// Removes `key` from the listing. Returns [`STATUS_OK`].
    pub fn delete_product(&mut self, caller: &Principal, key: &ProductKey) -> Result<u64, CatalogError> {
        self.require_owner(caller, "delete products")?;
        self.products
            .remove(key)
            .ok_or_else(|| CatalogError::NotFound(key.to_string()))?;
        Ok(STATUS_OK)
    }

    /// Quoted price of `key` under the configured pricing policy.
    pub fn get_product_price(&self, key: &ProductKey) -> Result<u64, CatalogError> {
        let product = self.lookup(key)?;
        Ok(match self.pricing {
            PricingPolicy::UnitPrice => product.unit_price,
            PricingPolicy::QuantityAlias => product.stock,
        })
    }

    /// Takes `quantity` items out of stock and returns the unit price.
    pub fn decrement_stock(&mut self, key: &ProductKey, quantity: u64) -> Result<u64, CatalogError> {
        let product = self
            .products
            .get_mut(key)
            .ok_or_else(|| CatalogError::NotFound(key.to_string()))?;
        if quantity > product.stock {
            return Err(CatalogError::InsufficientStock {
                key: key.to_string(),
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(product.unit_price)
    }

    pub fn get_product(&self, key: &ProductKey) -> Option<&Product> {
        self.products.get(key)
    }

    /// Listed products in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProductKey, &Product)> {
        self.products.iter()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.products.len()
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    /// Puts a listing back to a checkpointed value; `None` means unlisted.
    pub(crate) fn restore_entry(&mut self, key: ProductKey, entry: Option<Product>) {
        match entry {
            Some(product) => {
                self.products.insert(key, product);
            }
            None => {
                self.products.remove(&key);
            }
        }
    }

    fn lookup(&self, key: &ProductKey) -> Result<&Product, CatalogError> {
        self.products
            .get(key)
            .ok_or_else(|| CatalogError::NotFound(key.to_string()))
    }

    fn require_owner(&self, caller: &Principal, action: &'static str) -> Result<(), CatalogError> {
        if *caller != self.owner {
            return Err(CatalogError::Unauthorized(action));
        }
        Ok(())
    }
}
