//! Catalog commands. None of these need a session.

use tienda_core::ProductId;

use super::{CliError, Context, report};
use crate::output;

pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let products = ctx.client.list_products().await.map_err(report)?;
    output::products(&products);
    Ok(())
}

pub async fn show(ctx: &Context, id: &str) -> Result<(), CliError> {
    let product = ctx
        .client
        .get_product(&ProductId::new(id.trim()))
        .await
        .map_err(report)?;
    output::product(&product);
    Ok(())
}

pub async fn category(ctx: &Context, name: &str) -> Result<(), CliError> {
    let products = ctx
        .client
        .products_by_category(name)
        .await
        .map_err(report)?;
    output::products(&products);
    Ok(())
}

pub async fn search(ctx: &Context, query: &str) -> Result<(), CliError> {
    if query.trim().is_empty() {
        return Err(CliError::InvalidArgument("search query is empty".to_string()));
    }
    let products = ctx.client.search_products(query).await.map_err(report)?;
    output::products(&products);
    Ok(())
}
