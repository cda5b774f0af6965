//! Cart commands.

use tienda_client::{Notice, QuantityChange};
use tienda_core::ProductId;

use super::{CliError, Context, report};
use crate::output;

fn product_id(raw: &str) -> Result<ProductId, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::InvalidArgument("product id is empty".to_string()));
    }
    Ok(ProductId::new(trimmed))
}

pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let cart = ctx.client.fetch_cart().await.map_err(report)?;
    output::cart(&cart);
    Ok(())
}

pub async fn add(ctx: &Context, id: &str, quantity: u32) -> Result<(), CliError> {
    let id = product_id(id)?;
    ctx.client.add_to_cart(&id, quantity).await.map_err(report)?;
    output::notice(&Notice::success(format!("Added {quantity} x {id} to the cart")));
    Ok(())
}

pub async fn increment(ctx: &Context, id: &str) -> Result<(), CliError> {
    let id = product_id(id)?;
    ctx.client.increment(&id).await.map_err(report)?;
    output::notice(&Notice::success(format!("One more {id}")));
    Ok(())
}

/// Remove one unit. The quantity shown by the server decides whether the
/// line is adjusted or removed.
pub async fn decrement(ctx: &Context, id: &str) -> Result<(), CliError> {
    let id = product_id(id)?;
    let cart = ctx.client.fetch_cart().await.map_err(report)?;
    let Some(line) = cart.line(&id) else {
        return Err(CliError::InvalidArgument(format!("{id} is not in the cart")));
    };

    match ctx.client.decrement(line).await.map_err(report)? {
        QuantityChange::Adjusted => {
            output::notice(&Notice::success(format!("One less {id}")));
        }
        QuantityChange::Removed => {
            output::notice(&Notice::success(format!("Removed {id} from the cart")));
        }
    }
    Ok(())
}

pub async fn remove(ctx: &Context, id: &str) -> Result<(), CliError> {
    let id = product_id(id)?;
    ctx.client.remove_from_cart(&id).await.map_err(report)?;
    output::notice(&Notice::success(format!("Removed {id} from the cart")));
    Ok(())
}
