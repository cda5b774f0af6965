//! Wishlist entries with set semantics.

use serde::{Deserialize, Serialize};

use super::{ProductId, ProductRef};

/// A product saved to the wishlist.
///
/// The server returns bare product snapshots, so an entry is transparent on
/// the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WishlistEntry {
    pub product: ProductRef,
}

/// The wishlist as last reported by the server.
///
/// A product is either present or absent; there is no quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist {
    entries: Vec<WishlistEntry>,
}

impl Wishlist {
    /// Build a wishlist from server entries, dropping repeated products.
    #[must_use]
    pub fn from_entries(entries: Vec<WishlistEntry>) -> Self {
        let mut unique: Vec<WishlistEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !unique.iter().any(|e| e.product.id == entry.product.id) {
                unique.push(entry);
            }
        }
        Self { entries: unique }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[WishlistEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.entries.iter().any(|e| &e.product.id == product_id)
    }

    /// Add a product locally; a no-op when already present.
    pub fn insert_local(&mut self, product: ProductRef) {
        if !self.contains(&product.id) {
            self.entries.push(WishlistEntry { product });
        }
    }

    /// Remove a product locally; a no-op when absent.
    pub fn remove_local(&mut self, product_id: &ProductId) {
        self.entries.retain(|e| &e.product.id != product_id);
    }
}

impl From<Vec<WishlistEntry>> for Wishlist {
    fn from(entries: Vec<WishlistEntry>) -> Self {
        Self::from_entries(entries)
    }
}
