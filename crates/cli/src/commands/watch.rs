//! Live cart and wishlist views.
//!
//! Mounts one binding per resource and prints every state change. Commands
//! typed on stdin run through the bindings, so optimistic edits, reverts and
//! the re-fetches their change events trigger all show up as they happen.
//!
//! ```text
//! add <id> [qty]   add units to the cart
//! inc <id>         one more unit
//! dec <id>         one less unit (removes the line at 1)
//! rm <id>          remove a line
//! toggle <id>      save or unsave a product
//! route <path>     report navigation; a new route re-syncs both views
//! dismiss          clear notices
//! help             list commands
//! ```

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, BufReader};

use tienda_client::{
    CartResource, ClientError, Notice, QuantityChange, Resource, StoreClient, ViewBinding,
    ViewState, WishlistResource,
};
use tienda_core::{Cart, ProductId, Wishlist};

use super::{CliError, Context};
use crate::output;

const HELP: &str = "Commands: add <id> [qty] | inc <id> | dec <id> | rm <id> | toggle <id> | \
                    route <path> | dismiss | help";

/// A mutation in flight; yields the message to show when it succeeds.
type Pending<'a> = Pin<Box<dyn Future<Output = Result<String, ClientError>> + 'a>>;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Add { id: ProductId, quantity: u32 },
    Increment(ProductId),
    Decrement(ProductId),
    Remove(ProductId),
    Toggle(ProductId),
    Route(String),
    Dismiss,
    Help,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb {
            "add" => {
                let id = product_arg(words.next(), verb)?;
                let quantity = match words.next() {
                    None => 1,
                    Some(raw) => raw
                        .parse()
                        .map_err(|_| format!("invalid quantity '{raw}'"))?,
                };
                Self::Add { id, quantity }
            }
            "inc" => Self::Increment(product_arg(words.next(), verb)?),
            "dec" => Self::Decrement(product_arg(words.next(), verb)?),
            "rm" | "remove" => Self::Remove(product_arg(words.next(), verb)?),
            "toggle" => Self::Toggle(product_arg(words.next(), verb)?),
            "route" => Self::Route(
                words
                    .next()
                    .ok_or_else(|| "`route` needs a path".to_string())?
                    .to_string(),
            ),
            "dismiss" => Self::Dismiss,
            "help" | "?" => Self::Help,
            other => return Err(format!("unknown command '{other}'")),
        };
        Ok(Some(command))
    }
}

fn product_arg(word: Option<&str>, verb: &str) -> Result<ProductId, String> {
    word.map(ProductId::new)
        .ok_or_else(|| format!("`{verb}` needs a product id"))
}

struct Views<'a> {
    client: &'a StoreClient,
    cart: &'a ViewBinding<CartResource>,
    wishlist: &'a ViewBinding<WishlistResource>,
}

impl<'a> Views<'a> {
    /// Handle one command. Mutations are returned to be awaited alongside
    /// view updates.
    fn dispatch(&self, command: Command) -> Option<Pending<'a>> {
        let Views {
            client,
            cart,
            wishlist,
        } = *self;

        match command {
            Command::Route(route) => {
                let cart_resync = cart.route_changed(&route);
                let wishlist_resync = wishlist.route_changed(&route);
                if !(cart_resync || wishlist_resync) {
                    output::notice(&Notice::info(format!("Route is now {route}")));
                }
                None
            }
            Command::Dismiss => {
                cart.dismiss_notice();
                wishlist.dismiss_notice();
                None
            }
            Command::Help => {
                output::line(HELP);
                None
            }
            Command::Add { id, quantity } => Some(Box::pin(async move {
                let product = client.get_product(&id).await?;
                cart.add(&product, quantity).await?;
                Ok(format!("Added {quantity} x {}", product.title))
            })),
            Command::Increment(id) => Some(Box::pin(async move {
                cart.increment(&id).await?;
                Ok(format!("One more {id}"))
            })),
            Command::Decrement(id) => Some(Box::pin(async move {
                Ok(match cart.decrement(&id).await? {
                    QuantityChange::Adjusted => format!("One less {id}"),
                    QuantityChange::Removed => format!("Removed {id}"),
                })
            })),
            Command::Remove(id) => Some(Box::pin(async move {
                cart.remove(&id).await?;
                Ok(format!("Removed {id}"))
            })),
            Command::Toggle(id) => Some(Box::pin(async move {
                let product = client.get_product(&id).await?;
                Ok(if wishlist.toggle(&product).await? {
                    format!("Saved {}", product.title)
                } else {
                    format!("Unsaved {}", product.title)
                })
            })),
        }
    }
}

/// Await the mutation in flight; never resolves when there is none.
async fn finish(pending: &mut Option<Pending<'_>>) -> Result<String, ClientError> {
    match pending {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

fn describe_cart(cart: &Cart) -> String {
    format!(
        "{} line(s), {} item(s), subtotal {}",
        cart.lines().len(),
        cart.item_count(),
        cart.subtotal()
    )
}

fn describe_wishlist(wishlist: &Wishlist) -> String {
    format!("{} saved product(s)", wishlist.len())
}

fn print_cart(state: &ViewState<Cart>) {
    output::view_change(CartResource::NAME, state, describe_cart);
}

fn print_wishlist(state: &ViewState<Wishlist>) {
    output::view_change(WishlistResource::NAME, state, describe_wishlist);
}

/// Run until Ctrl+C.
///
/// Stdin is read one command per line, and the next command is read only
/// after the previous mutation settles. Closing stdin keeps the views
/// running.
pub async fn watch(ctx: &Context) -> Result<(), CliError> {
    let cart = ViewBinding::cart(&ctx.client);
    let wishlist = ViewBinding::wishlist(&ctx.client);
    let mut cart_rx = cart.watch();
    let mut wishlist_rx = wishlist.watch();
    let views = Views {
        client: &ctx.client,
        cart: &cart,
        wishlist: &wishlist,
    };

    cart.mount();
    wishlist.mount();
    tracing::info!("Watching cart and wishlist, press Ctrl+C to stop");
    output::line(HELP);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    let mut pending: Option<Pending<'_>> = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                break;
            }
            changed = cart_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                print_cart(&cart_rx.borrow_and_update());
            }
            changed = wishlist_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                print_wishlist(&wishlist_rx.borrow_and_update());
            }
            done = finish(&mut pending), if pending.is_some() => {
                pending = None;
                match done {
                    Ok(message) => output::notice(&Notice::success(message)),
                    // The view already shows the reverted state and notice.
                    Err(e) => tracing::warn!(error = %e, "command failed"),
                }
            }
            line = input.next_line(), if input_open && pending.is_none() => {
                match line? {
                    Some(text) => match Command::parse(&text) {
                        Ok(Some(command)) => pending = views.dispatch(command),
                        Ok(None) => {}
                        Err(message) => output::notice(&Notice::error(message)),
                    },
                    None => {
                        tracing::debug!("stdin closed, still watching");
                        input_open = false;
                    }
                }
            }
        }
    }

    drop(pending);
    cart.unmount();
    wishlist.unmount();
    tracing::info!("Stopped watching");
    Ok(())
}
