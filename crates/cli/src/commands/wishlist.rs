//! Wishlist commands.

use tienda_client::Notice;
use tienda_core::ProductId;

use super::{CliError, Context, report};
use crate::output;

pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let wishlist = ctx.client.fetch_wishlist().await.map_err(report)?;
    output::wishlist(&wishlist);
    Ok(())
}

pub async fn add(ctx: &Context, id: &str) -> Result<(), CliError> {
    let id = ProductId::new(id.trim());
    ctx.client.add_to_wishlist(&id).await.map_err(report)?;
    output::notice(&Notice::success(format!("Saved {id} to the wishlist")));
    Ok(())
}

pub async fn remove(ctx: &Context, id: &str) -> Result<(), CliError> {
    let id = ProductId::new(id.trim());
    ctx.client.remove_from_wishlist(&id).await.map_err(report)?;
    output::notice(&Notice::success(format!("Removed {id} from the wishlist")));
    Ok(())
}

pub async fn check(ctx: &Context, id: &str) -> Result<(), CliError> {
    let id = ProductId::new(id.trim());
    let saved = ctx.client.check_wishlist(&id).await.map_err(report)?;
    if saved {
        output::line(format!("{id} is in the wishlist"));
    } else {
        output::line(format!("{id} is not in the wishlist"));
    }
    Ok(())
}

/// Flip membership based on what the server reports right now.
pub async fn toggle(ctx: &Context, id: &str) -> Result<(), CliError> {
    let id = ProductId::new(id.trim());
    let currently_in = ctx.client.check_wishlist(&id).await.map_err(report)?;
    let now_in = ctx
        .client
        .toggle_wishlist(&id, currently_in)
        .await
        .map_err(report)?;

    let message = if now_in {
        format!("Saved {id} to the wishlist")
    } else {
        format!("Removed {id} from the wishlist")
    };
    output::notice(&Notice::success(message));
    Ok(())
}
