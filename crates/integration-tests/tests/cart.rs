//! Cart and wishlist mutations against the fake API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tienda_client::{ChangeEvent, ClientError, QuantityChange};
use tienda_core::{Price, ProductId};
use tienda_integration_tests::{ANA_EMAIL, FakeApi, MATE, TERMO, YERBA};

#[tokio::test]
async fn test_add_merges_lines_and_totals() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();
    let mate = ProductId::new(MATE);

    client.add_to_cart(&mate, 2).await.expect("add mate");
    client.add_to_cart(&mate, 1).await.expect("add mate again");
    client
        .add_to_cart(&ProductId::new(TERMO), 1)
        .await
        .expect("add termo");

    let cart = client.fetch_cart().await.expect("fetch cart");
    assert_eq!(cart.lines().len(), 2);
    assert_eq!(cart.quantity_of(&mate), 3);
    assert_eq!(cart.item_count(), 4);
    assert_eq!(cart.subtotal(), Price::from_units(3 * 1200 + 9000));
}

#[tokio::test]
async fn test_every_mutation_publishes_once() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();
    let published = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&published);
    let _sub = client.events().subscribe(ChangeEvent::CartUpdated, move |_| {
        handle.fetch_add(1, Ordering::SeqCst);
    });
    let yerba = ProductId::new(YERBA);

    client.add_to_cart(&yerba, 1).await.expect("add");
    client.increment(&yerba).await.expect("increment");
    client.remove_from_cart(&yerba).await.expect("remove");

    assert_eq!(published.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_decrement_last_unit_removes_line() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();
    let mate = ProductId::new(MATE);
    client.add_to_cart(&mate, 2).await.expect("add");

    let cart = client.fetch_cart().await.expect("fetch");
    let line = cart.line(&mate).expect("line present");
    let change = client.decrement(line).await.expect("decrement");
    assert_eq!(change, QuantityChange::Adjusted);
    assert_eq!(api.cart_of(ANA_EMAIL), vec![(MATE.to_string(), 1)]);

    let cart = client.fetch_cart().await.expect("fetch");
    let line = cart.line(&mate).expect("line present");
    let change = client.decrement(line).await.expect("decrement");
    assert_eq!(change, QuantityChange::Removed);
    assert!(api.cart_of(ANA_EMAIL).is_empty());
    assert_eq!(api.hits("DELETE /api/cart/remove/{id}"), 1);
    assert_eq!(api.hits("PUT /api/cart/update"), 1);
}

#[tokio::test]
async fn test_zero_quantity_is_rejected_locally() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();

    let err = client
        .add_to_cart(&ProductId::new(MATE), 0)
        .await
        .expect_err("zero quantity");

    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(api.hits("POST /api/cart/add"), 0);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();

    let err = client
        .add_to_cart(&ProductId::new("p-missing"), 1)
        .await
        .expect_err("no such product");

    assert!(err.is_not_found());
    assert!(client.has_session());
}

#[tokio::test]
async fn test_server_error_does_not_publish() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();
    let published = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&published);
    let _sub = client.events().subscribe(ChangeEvent::CartUpdated, move |_| {
        handle.fetch_add(1, Ordering::SeqCst);
    });
    api.fail_mutations(true);

    let err = client
        .add_to_cart(&ProductId::new(MATE), 1)
        .await
        .expect_err("injected failure");

    assert!(matches!(err, ClientError::ServerError { status: 500, .. }));
    assert_eq!(published.load(Ordering::SeqCst), 0);
    assert!(client.has_session());
}

#[tokio::test]
async fn test_wishlist_toggle_round_trip() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();
    let termo = ProductId::new(TERMO);
    let published = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&published);
    let _sub = client
        .events()
        .subscribe(ChangeEvent::WishlistUpdated, move |_| {
            handle.fetch_add(1, Ordering::SeqCst);
        });

    assert!(!client.check_wishlist(&termo).await.expect("check"));
    assert!(client.toggle_wishlist(&termo, false).await.expect("toggle on"));
    assert!(client.check_wishlist(&termo).await.expect("check"));

    // Adding twice keeps a single entry.
    client.add_to_wishlist(&termo).await.expect("add again");
    let wishlist = client.fetch_wishlist().await.expect("fetch");
    assert_eq!(wishlist.len(), 1);
    assert!(wishlist.contains(&termo));

    assert!(!client.toggle_wishlist(&termo, true).await.expect("toggle off"));
    assert!(api.wishlist_of(ANA_EMAIL).is_empty());
    assert_eq!(published.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_catalog_is_public_and_cached() {
    let api = FakeApi::start().await;
    let client = api.client();

    let products = client.list_products().await.expect("list");
    assert_eq!(products.len(), 3);
    client.list_products().await.expect("list again");
    assert_eq!(api.hits("GET /api/products"), 1);

    let mate = client
        .get_product(&ProductId::new(MATE))
        .await
        .expect("show");
    assert_eq!(mate.stock, 10);

    let yerbas = client
        .products_by_category("yerba-mate")
        .await
        .expect("category");
    assert_eq!(yerbas.len(), 1);

    let found = client.search_products("TERMO").await.expect("search");
    assert_eq!(found.len(), 1);
    assert!(client.search_products("   ").await.expect("blank").is_empty());
    assert_eq!(api.hits("GET /api/products/search"), 1);
}
