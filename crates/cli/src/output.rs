//! Plain-text rendering of storefront data on stdout.

#![allow(clippy::print_stdout)]

use std::io::Write;

use tienda_client::{Notice, NoticeLevel, Phase, ViewState};
use tienda_core::{Cart, CheckoutSummary, Order, Price, ProductRef, Wishlist};

/// `Price` ignores width flags, so padded columns go through a `String`.
fn money(price: Price) -> String {
    price.to_string()
}

pub fn notice(notice: &Notice) {
    let marker = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Info => "--",
        NoticeLevel::Error => "!!",
    };
    println!("[{marker}] {notice}");
}

pub fn line(text: impl std::fmt::Display) {
    println!("{text}");
}

/// Print a prompt without a trailing newline.
pub fn prompt(text: &str) -> std::io::Result<()> {
    print!("{text}");
    std::io::stdout().flush()
}

pub fn products(products: &[ProductRef]) {
    if products.is_empty() {
        println!("No products found.");
        return;
    }
    println!("{:<26} {:>10} {:>6}  TITLE", "ID", "PRICE", "STOCK");
    println!("{}", "-".repeat(60));
    for product in products {
        let sale = if product.is_on_sale() { " (sale)" } else { "" };
        println!(
            "{:<26} {:>10} {:>6}  {}{sale}",
            product.id.as_str(),
            money(product.price),
            product.stock,
            product.title
        );
    }
    println!("\n{} product(s)", products.len());
}

pub fn product(product: &ProductRef) {
    println!("{}", product.title);
    println!("  id:       {}", product.id);
    match product.original_price {
        Some(original) if product.is_on_sale() => {
            println!("  price:    {} (was {original})", product.price);
        }
        _ => println!("  price:    {}", product.price),
    }
    println!("  stock:    {}", product.stock);
    if let Some(category) = &product.category {
        println!("  category: {category}");
    }
    if let Some(brand) = &product.brand {
        println!("  brand:    {brand}");
    }
    if product.review_count > 0 {
        println!("  rating:   {:.1} ({} reviews)", product.rating, product.review_count);
    }
    if !product.description.is_empty() {
        println!("\n{}", product.description);
    }
}

pub fn cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    println!("{:<26} {:>4} {:>10} {:>10}  TITLE", "ID", "QTY", "UNIT", "TOTAL");
    println!("{}", "-".repeat(70));
    for line in cart.lines() {
        println!(
            "{:<26} {:>4} {:>10} {:>10}  {}",
            line.product.id.as_str(),
            line.quantity,
            money(line.product.price),
            money(line.line_total()),
            line.product.title
        );
    }
    println!("\n{} item(s), subtotal {}", cart.item_count(), cart.subtotal());
}

pub fn wishlist(wishlist: &Wishlist) {
    if wishlist.is_empty() {
        println!("Your wishlist is empty.");
        return;
    }
    for entry in wishlist.entries() {
        println!(
            "{:<26} {:>10}  {}",
            entry.product.id.as_str(),
            money(entry.product.price),
            entry.product.title
        );
    }
    println!("\n{} saved product(s)", wishlist.len());
}

pub fn summary(summary: &CheckoutSummary) {
    println!("  subtotal: {:>10}", money(summary.subtotal));
    println!("  shipping: {:>10}", money(summary.shipping_cost));
    if summary.discount > Price::ZERO {
        println!("  discount: {:>10}", format!("-{}", summary.discount));
    }
    println!("  total:    {:>10}", money(summary.total));
}

pub fn order(order: &Order) {
    println!("Order {} ({})", order.id, order.status);
    if let Some(created_at) = order.created_at {
        println!("  placed:   {}", created_at.format("%Y-%m-%d %H:%M"));
    }
    for item in &order.items {
        println!("  {:>3} x {:<30} {:>10}", item.quantity, item.name, money(item.price));
    }
    if let Some(subtotal) = order.subtotal {
        println!("  subtotal: {:>10}", money(subtotal));
    }
    println!("  shipping: {:>10}", money(order.shipping_cost));
    if order.discount > Price::ZERO {
        println!("  discount: {:>10}", format!("-{}", order.discount));
    }
    println!("  total:    {:>10}", money(order.total));
}

/// One line per view-state change, prefixed with the view name.
pub fn view_change<T>(name: &str, state: &ViewState<T>, describe: impl Fn(&T) -> String) {
    let phase = match state.phase {
        Phase::Unmounted => "unmounted",
        Phase::Anonymous => "anonymous",
        Phase::Loading => "loading",
        Phase::Ready => "ready",
        Phase::Failed => "failed",
    };
    println!("[{name} v{}] {phase}: {}", state.version, describe(&state.data));
    if let Some(notice) = &state.notice {
        println!("[{name} v{}]   {notice}", state.version);
    }
    if state.login_required {
        println!("[{name} v{}]   login required", state.version);
    }
}
