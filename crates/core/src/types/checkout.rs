//! Checkout math: shipping, coupons and the order request body.
//!
//! Everything here is local. A coupon that fails validation never reaches
//! the network.

use serde::{Deserialize, Serialize};

use super::{Cart, Price, ProductId};

/// Errors produced while preparing a checkout.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// The coupon code is empty or contains characters codes never use.
    #[error("coupon code is malformed")]
    MalformedCoupon,
    /// The coupon code is well-formed but not recognized.
    #[error("coupon {0} is not valid or has expired")]
    UnknownCoupon(String),
    /// There is nothing to check out.
    #[error("cart is empty")]
    EmptyCart,
}

/// Delivery speed chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
}

impl ShippingMethod {
    /// Flat shipping cost for this method.
    #[must_use]
    pub fn cost(self) -> Price {
        match self {
            Self::Standard => Price::from_units(800),
            Self::Express => Price::from_units(1500),
        }
    }
}

impl std::str::FromStr for ShippingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            _ => Err(format!("invalid shipping method: {s}")),
        }
    }
}

/// Payment method label sent with the order.
///
/// Payment forms are presentational; only the label travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CreditCard,
    DebitCard,
    Transfer,
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(Self::CreditCard),
            "debit_card" => Ok(Self::DebitCard),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// A validated discount coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coupon {
    code: String,
    percent_off: u32,
}

impl Coupon {
    /// Codes the store currently honours, with their percentage.
    const KNOWN: &'static [(&'static str, u32)] = &[("DESCUENTO10", 10)];

    /// Validate a coupon code.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::MalformedCoupon`] for empty input or
    /// characters outside `A-Z`, `0-9`, `-` and `_`, and
    /// [`CheckoutError::UnknownCoupon`] for codes the store does not honour.
    pub fn parse(input: &str) -> Result<Self, CheckoutError> {
        let code = input.trim().to_uppercase();
        if code.is_empty()
            || !code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(CheckoutError::MalformedCoupon);
        }

        Self::KNOWN
            .iter()
            .find(|(known, _)| *known == code)
            .map(|&(_, percent_off)| Self {
                code: code.clone(),
                percent_off,
            })
            .ok_or(CheckoutError::UnknownCoupon(code))
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub const fn percent_off(&self) -> u32 {
        self.percent_off
    }

    /// Discount granted on a subtotal.
    #[must_use]
    pub fn discount_on(&self, subtotal: Price) -> Price {
        subtotal.percent(self.percent_off)
    }
}

/// Totals shown on the checkout page and sent with the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    pub subtotal: Price,
    pub shipping_cost: Price,
    pub discount: Price,
    pub total: Price,
}

impl CheckoutSummary {
    /// Compute totals for a cart.
    #[must_use]
    pub fn compute(cart: &Cart, shipping: ShippingMethod, coupon: Option<&Coupon>) -> Self {
        let subtotal = cart.subtotal();
        let shipping_cost = shipping.cost();
        let discount = coupon.map_or(Price::ZERO, |c| c.discount_on(subtotal));
        let total = (subtotal + shipping_cost).saturating_sub(discount);
        Self {
            subtotal,
            shipping_cost,
            discount,
            total,
        }
    }
}

/// Delivery address entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl Default for ShippingAddress {
    fn default() -> Self {
        Self {
            street: String::new(),
            city: String::new(),
            state: String::new(),
            zip: String::new(),
            country: "Argentina".to_string(),
        }
    }
}

/// One order line as sent to the checkout endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Price,
    pub name: String,
}

/// Body of `POST /api/orders/checkout`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub shipping_method: ShippingMethod,
    pub subtotal: Price,
    pub shipping_cost: Price,
    pub discount: Price,
    pub total: Price,
}

impl CheckoutRequest {
    /// Build the order body from the confirmed cart.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] when the cart has no lines.
    pub fn from_cart(
        cart: &Cart,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        shipping_method: ShippingMethod,
        coupon: Option<&Coupon>,
    ) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let summary = CheckoutSummary::compute(cart, shipping_method, coupon);
        let items = cart
            .lines()
            .iter()
            .map(|line| CheckoutItem {
                product_id: line.product.id.clone(),
                quantity: line.quantity,
                price: line.product.price,
                name: line.product.title.clone(),
            })
            .collect();

        Ok(Self {
            items,
            shipping_address,
            payment_method,
            shipping_method,
            subtotal: summary.subtotal,
            shipping_cost: summary.shipping_cost,
            discount: summary.discount,
            total: summary.total,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{CartLine, ProductRef};

    fn cart() -> Cart {
        Cart::from_lines(vec![
            CartLine {
                product: ProductRef::new("a", "Yerba", Price::from_units(1000)),
                quantity: 2,
            },
            CartLine {
                product: ProductRef::new("b", "Termo", Price::from_units(5000)),
                quantity: 1,
            },
        ])
    }

    #[test]
    fn test_known_coupon_is_case_insensitive() {
        let coupon = Coupon::parse(" descuento10 ").unwrap();
        assert_eq!(coupon.code(), "DESCUENTO10");
        assert_eq!(coupon.percent_off(), 10);
    }

    #[test]
    fn test_malformed_coupons() {
        assert_eq!(Coupon::parse(""), Err(CheckoutError::MalformedCoupon));
        assert_eq!(Coupon::parse("10% OFF"), Err(CheckoutError::MalformedCoupon));
    }

    #[test]
    fn test_unknown_coupon() {
        assert_eq!(
            Coupon::parse("VERANO"),
            Err(CheckoutError::UnknownCoupon("VERANO".to_string()))
        );
    }

    #[test]
    fn test_summary_without_coupon() {
        let summary = CheckoutSummary::compute(&cart(), ShippingMethod::Standard, None);
        assert_eq!(summary.subtotal, Price::from_units(7000));
        assert_eq!(summary.shipping_cost, Price::from_units(800));
        assert_eq!(summary.discount, Price::ZERO);
        assert_eq!(summary.total, Price::from_units(7800));
    }

    #[test]
    fn test_summary_with_coupon_and_express() {
        let coupon = Coupon::parse("DESCUENTO10").unwrap();
        let summary = CheckoutSummary::compute(&cart(), ShippingMethod::Express, Some(&coupon));
        assert_eq!(summary.discount, Price::from_units(700));
        assert_eq!(summary.total, Price::from_units(7000 + 1500 - 700));
    }

    #[test]
    fn test_request_from_empty_cart_fails() {
        let result = CheckoutRequest::from_cart(
            &Cart::empty(),
            ShippingAddress::default(),
            PaymentMethod::CreditCard,
            ShippingMethod::Standard,
            None,
        );
        assert_eq!(result, Err(CheckoutError::EmptyCart));
    }

    #[test]
    fn test_request_serializes_wire_names() {
        let request = CheckoutRequest::from_cart(
            &cart(),
            ShippingAddress::default(),
            PaymentMethod::CreditCard,
            ShippingMethod::Express,
            None,
        )
        .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["shipping_method"], "express");
        assert_eq!(json["payment_method"], "credit_card");
        assert_eq!(json["items"][0]["product_id"], "a");
        assert_eq!(json["items"][0]["name"], "Yerba");
        assert_eq!(json["shipping_address"]["country"], "Argentina");
    }
}
