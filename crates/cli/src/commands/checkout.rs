//! Checkout and order commands.

use clap::Args;

use tienda_client::Notice;
use tienda_core::{
    CheckoutRequest, CheckoutSummary, Coupon, OrderId, PaymentMethod, ShippingAddress,
    ShippingMethod,
};

use super::{CliError, Context, report};
use crate::output;

#[derive(Args)]
pub struct CheckoutArgs {
    /// Street and number
    #[arg(long)]
    street: String,

    #[arg(long)]
    city: String,

    /// State or province
    #[arg(long)]
    state: String,

    /// Postal code
    #[arg(long)]
    zip: String,

    #[arg(long, default_value = "Argentina")]
    country: String,

    /// credit_card, debit_card or transfer
    #[arg(long, default_value = "credit_card")]
    payment: PaymentMethod,

    /// standard or express
    #[arg(long, default_value = "standard")]
    shipping: ShippingMethod,

    /// Discount code
    #[arg(long)]
    coupon: Option<String>,

    /// Show the summary without placing the order
    #[arg(long)]
    dry_run: bool,
}

/// Price the current cart and, unless `--dry-run`, place the order.
pub async fn checkout(ctx: &Context, args: CheckoutArgs) -> Result<(), CliError> {
    let coupon = args.coupon.as_deref().map(Coupon::parse).transpose()?;
    if let Some(coupon) = &coupon {
        output::notice(&Notice::success(format!(
            "Coupon {} applied: {}% off",
            coupon.code(),
            coupon.percent_off()
        )));
    }

    let cart = ctx.client.fetch_cart().await.map_err(report)?;
    output::cart(&cart);

    let address = ShippingAddress {
        street: args.street,
        city: args.city,
        state: args.state,
        zip: args.zip,
        country: args.country,
    };
    let request =
        CheckoutRequest::from_cart(&cart, address, args.payment, args.shipping, coupon.as_ref())?;
    output::line("");
    output::summary(&CheckoutSummary::compute(&cart, args.shipping, coupon.as_ref()));

    if args.dry_run {
        output::notice(&Notice::info("Dry run, no order placed"));
        return Ok(());
    }

    let order_id = ctx.client.checkout(&request).await.map_err(report)?;
    output::notice(&Notice::success(format!("Order {order_id} placed")));
    Ok(())
}

pub async fn show_order(ctx: &Context, id: &str) -> Result<(), CliError> {
    let order = ctx
        .client
        .get_order(&OrderId::new(id.trim()))
        .await
        .map_err(report)?;
    output::order(&order);
    Ok(())
}
