//! Cart lines and cart totals.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId, ProductRef};

/// One product/quantity pair in the shopping cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product snapshot.
    pub product: ProductRef,
    /// Units of the product, always at least 1.
    pub quantity: u32,
}

impl CartLine {
    /// Line total (`price × quantity`).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// The cart as last reported by the server.
///
/// Holds at most one line per product. Lines are kept in server order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Build a cart from server lines.
    ///
    /// Duplicate products are merged by summing quantities and lines with a
    /// zero quantity are dropped.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match merged.iter_mut().find(|l| l.product.id == line.product.id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => merged.push(line),
            }
        }
        Self { lines: merged }
    }

    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self { lines: Vec::new() }
    }

    /// The cart lines.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product.id == product_id)
    }

    /// Quantity of a product in the cart (0 when absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.line(product_id).map_or(0, |l| l.quantity)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |total: u32, l| total.saturating_add(l.quantity))
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Apply a signed quantity change locally.
    ///
    /// Used for optimistic rendering only; the server remains authoritative.
    /// A change that takes the line to zero or below removes it. A positive
    /// change for an absent product is ignored because there is no snapshot
    /// to display.
    pub fn apply_delta(&mut self, product_id: &ProductId, delta: i32) {
        let Some(index) = self.lines.iter().position(|l| &l.product.id == product_id) else {
            return;
        };
        let current = i64::from(self.lines.get(index).map_or(0, |l| l.quantity));
        let next = current + i64::from(delta);
        if next <= 0 {
            self.lines.remove(index);
        } else if let Some(line) = self.lines.get_mut(index) {
            line.quantity = u32::try_from(next).unwrap_or(u32::MAX);
        }
    }

    /// Insert or bump a line locally (optimistic add).
    pub fn add_local(&mut self, product: ProductRef, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(CartLine { product, quantity }),
        }
    }

    /// Remove a line locally (optimistic delete).
    pub fn remove_local(&mut self, product_id: &ProductId) {
        self.lines.retain(|l| &l.product.id != product_id);
    }
}

impl From<Vec<CartLine>> for Cart {
    fn from(lines: Vec<CartLine>) -> Self {
        Self::from_lines(lines)
    }
}
