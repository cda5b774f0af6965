//! Orders placed from a fetched cart.

use tienda_client::{ClientError, Phase, ViewBinding};
use tienda_core::{
    CheckoutRequest, Coupon, OrderId, OrderStatus, PaymentMethod, Price, ShippingAddress,
    ShippingMethod,
};
use tienda_integration_tests::{ANA_EMAIL, FakeApi, MATE, TERMO};

fn address() -> ShippingAddress {
    ShippingAddress {
        street: "Av. Corrientes 1234".to_string(),
        city: "Buenos Aires".to_string(),
        state: "CABA".to_string(),
        zip: "C1043".to_string(),
        ..ShippingAddress::default()
    }
}

#[tokio::test]
async fn test_checkout_places_order_and_empties_cart() {
    let api = FakeApi::start().await;
    api.put_in_cart(ANA_EMAIL, MATE, 2);
    api.put_in_cart(ANA_EMAIL, TERMO, 1);
    let client = api.signed_in_client();
    let cart_view = ViewBinding::cart(&client);
    let mut rx = cart_view.watch();
    cart_view.mount();
    rx.wait_for(|s| s.phase == Phase::Ready && !s.data.is_empty())
        .await
        .expect("cart view loads");

    let cart = client.fetch_cart().await.expect("fetch cart");
    let coupon = Coupon::parse("descuento10").expect("known coupon");
    let request = CheckoutRequest::from_cart(
        &cart,
        address(),
        PaymentMethod::DebitCard,
        ShippingMethod::Express,
        Some(&coupon),
    )
    .expect("cart is not empty");

    // 2 x 1200 + 9000 = 11400, 10% off = 1140, plus 1500 express.
    assert_eq!(request.total, Price::from_units(11_760));

    let order_id = client.checkout(&request).await.expect("checkout");
    assert_eq!(api.order_count(), 1);
    assert!(api.cart_of(ANA_EMAIL).is_empty());

    // The checkout event re-fetches the now empty cart.
    rx.wait_for(|s| s.phase == Phase::Ready && s.data.is_empty())
        .await
        .expect("cart view empties");

    let order = client.get_order(&order_id).await.expect("receipt");
    assert_eq!(order.item_count(), 3);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.shipping_method, ShippingMethod::Express);
    assert_eq!(order.total, Price::from_units(11_760));
    assert!(order.created_at.is_some());
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();

    let err = client
        .get_order(&OrderId::new("missing"))
        .await
        .expect_err("no such order");

    assert!(matches!(err, ClientError::NotFound(_)));
}

#[tokio::test]
async fn test_empty_cart_cannot_check_out() {
    let api = FakeApi::start().await;
    let client = api.signed_in_client();

    let cart = client.fetch_cart().await.expect("fetch cart");
    let result = CheckoutRequest::from_cart(
        &cart,
        address(),
        PaymentMethod::CreditCard,
        ShippingMethod::Standard,
        None,
    );

    assert!(result.is_err());
    assert_eq!(api.hits("POST /api/orders/checkout"), 0);
}
