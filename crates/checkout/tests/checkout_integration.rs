//! Integration tests for checkout and the order lifecycle against the
//! in-memory store.

use std::sync::Arc;
use std::time::Duration;

use checkout::{
    CartLine, CheckoutCoordinator, CheckoutError, CheckoutRequest, CheckoutSettings,
    InMemoryCart, InMemoryPaymentMethods, LifecycleError, OrderLifecycle,
};
use common::{ActorId, BuyerIdentity, OrderId, PaymentMethodId, SessionId, UserId, VariantId};
use domain::{
    Money, Order, OrderCodeStrategy, OrderStatus, PaymentStatus, ProductVariant, ShippingInfo,
    UnavailableReason,
};
use store::{FailPoint, MemoryStore};

type TestCoordinator = CheckoutCoordinator<MemoryStore, InMemoryCart, InMemoryPaymentMethods>;

struct TestHarness {
    coordinator: Arc<TestCoordinator>,
    lifecycle: OrderLifecycle<MemoryStore>,
    store: MemoryStore,
    cart: InMemoryCart,
    payment_methods: InMemoryPaymentMethods,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_settings(CheckoutSettings {
            cart_clear_backoff: Duration::from_millis(1),
            ..CheckoutSettings::default()
        })
    }

    fn with_settings(settings: CheckoutSettings) -> Self {
        let store = MemoryStore::new();
        let cart = InMemoryCart::new();
        let payment_methods = InMemoryPaymentMethods::with_methods([card()]);

        let lifecycle = OrderLifecycle::new(store.clone(), settings.timeout);
        let coordinator = CheckoutCoordinator::new(
            store.clone(),
            cart.clone(),
            payment_methods.clone(),
            settings,
        );

        Self {
            coordinator: Arc::new(coordinator),
            lifecycle,
            store,
            cart,
            payment_methods,
        }
    }

    async fn add_variant(&self, id: i64, price_cents: i64, stock: u32) -> VariantId {
        self.store
            .insert_variant(ProductVariant {
                id: VariantId::new(id),
                product_name: format!("Product {id}"),
                sku: format!("SKU-{id:03}"),
                selling_price: Money::from_cents(price_cents),
                stock_quantity: stock,
                is_active: true,
            })
            .await;
        VariantId::new(id)
    }

    async fn stock(&self, variant_id: VariantId) -> u32 {
        self.store.stock_of(variant_id).await.unwrap()
    }

    async fn checkout(&self, buyer: &BuyerIdentity) -> Result<Order, CheckoutError> {
        self.coordinator.checkout(request(buyer.clone())).await
    }

    /// Places an order for A x3 and B x2.
    async fn place_two_line_order(&self) -> (Order, VariantId, VariantId) {
        let a = self.add_variant(1, 1000, 10).await;
        let b = self.add_variant(2, 250, 10).await;
        let buyer = user();
        self.cart.add_line(buyer.clone(), a, 3);
        self.cart.add_line(buyer.clone(), b, 2);

        let order = self.checkout(&buyer).await.unwrap();
        (order, a, b)
    }

    async fn drive(&self, order_id: OrderId, path: &[OrderStatus]) {
        for status in path {
            self.lifecycle
                .transition(order_id, *status, None, None)
                .await
                .unwrap();
        }
    }
}

fn card() -> PaymentMethodId {
    PaymentMethodId::new(1)
}

fn user() -> BuyerIdentity {
    BuyerIdentity::User(UserId::new())
}

fn shipping() -> ShippingInfo {
    ShippingInfo {
        recipient_name: "Ada Lovelace".to_string(),
        phone: "+44 20 7946 0000".to_string(),
        address_line1: "12 Analytical Row".to_string(),
        address_line2: None,
        city: "London".to_string(),
        region: None,
        postal_code: "N1 9GU".to_string(),
        country_code: "GB".to_string(),
    }
}

fn request(buyer: BuyerIdentity) -> CheckoutRequest {
    CheckoutRequest::new(buyer, shipping(), card())
}

/// Statuses reachable from a fresh order, each with the path that reaches it.
fn paths() -> Vec<(OrderStatus, Vec<OrderStatus>)> {
    use OrderStatus::*;
    vec![
        (PendingConfirmation, vec![]),
        (Processing, vec![Processing]),
        (Shipped, vec![Processing, Shipped]),
        (Delivered, vec![Processing, Shipped, Delivered]),
        (Cancelled, vec![Cancelled]),
        (Returned, vec![Processing, Shipped, Returned]),
    ]
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_checkout_happy_path() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 2);

    let order = h
        .coordinator
        .checkout(request(buyer.clone()).with_shipping_fee(Money::from_cents(500)))
        .await
        .unwrap();

    assert_eq!(h.stock(variant).await, 3);
    assert_eq!(order.totals.subtotal, Money::from_cents(2000));
    assert_eq!(order.totals.discount, Money::zero());
    assert_eq!(order.totals.shipping_fee, Money::from_cents(500));
    assert_eq!(order.totals.grand_total, Money::from_cents(2500));
    assert_eq!(order.status, OrderStatus::PendingConfirmation);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.buyer, buyer);

    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].unit_price, Money::from_cents(1000));
    assert_eq!(order.items[0].sku, "SKU-001");
    assert_eq!(order.items[0].line_total, Money::from_cents(2000));

    let history = h.lifecycle.list_history(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_status, None);
    assert_eq!(history[0].new_status, OrderStatus::PendingConfirmation);
    assert_eq!(history[0].actor_id, buyer.user_id().map(ActorId::from));

    assert!(h.cart.lines(&buyer).is_empty());
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test]
async fn test_checkout_insufficient_stock() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 1).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 2);

    let err = h.checkout(&buyer).await.unwrap_err();

    match err {
        CheckoutError::ItemUnavailable {
            variant_id,
            requested,
            available,
            reason,
        } => {
            assert_eq!(variant_id, variant);
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
            assert_eq!(reason, UnavailableReason::InsufficientStock);
        }
        other => panic!("expected ItemUnavailable, got {other:?}"),
    }
    assert_eq!(h.stock(variant).await, 1);
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.cart.lines(&buyer).len(), 1);
}

#[tokio::test]
async fn test_checkout_unknown_payment_method() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 1);

    let err = h
        .coordinator
        .checkout(CheckoutRequest::new(buyer, shipping(), PaymentMethodId::new(42)))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentMethodNotFound(id) if id == PaymentMethodId::new(42)));
    assert!(!err.is_retryable());
    assert_eq!(h.stock(variant).await, 5);
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;

    let err = h.checkout(&user()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 0);
    let err = h.checkout(&buyer).await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_checkout_inactive_and_missing_variants() {
    let h = TestHarness::new();
    h.store
        .insert_variant(ProductVariant {
            id: VariantId::new(7),
            product_name: "Retired".to_string(),
            sku: "OLD-7".to_string(),
            selling_price: Money::from_cents(100),
            stock_quantity: 50,
            is_active: false,
        })
        .await;

    let buyer = user();
    h.cart.add_line(buyer.clone(), VariantId::new(7), 1);
    let err = h.checkout(&buyer).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::ItemUnavailable {
            reason: UnavailableReason::Inactive,
            ..
        }
    ));

    let buyer = user();
    h.cart.add_line(buyer.clone(), VariantId::new(99), 1);
    let err = h.checkout(&buyer).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::ItemUnavailable {
            reason: UnavailableReason::NotFound,
            available: 0,
            ..
        }
    ));
}

#[tokio::test]
async fn test_later_line_failure_rolls_back_earlier_reservations() {
    let h = TestHarness::new();
    let a = h.add_variant(1, 1000, 5).await;
    let b = h.add_variant(2, 1000, 1).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), a, 4);
    h.cart.add_line(buyer.clone(), b, 3);

    let err = h.checkout(&buyer).await.unwrap_err();

    assert!(matches!(err, CheckoutError::ItemUnavailable { variant_id, .. } if variant_id == b));
    assert_eq!(h.stock(a).await, 5);
    assert_eq!(h.stock(b).await, 1);
    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.store.history_count().await, 0);
}

#[tokio::test]
async fn test_failure_at_every_persistence_step_leaves_no_trace() {
    let steps = [
        FailPoint::Begin,
        FailPoint::Reserve,
        FailPoint::VariantLookup,
        FailPoint::NextOrderNumber,
        FailPoint::InsertOrder,
        FailPoint::AppendHistory,
        FailPoint::Commit,
    ];

    for step in steps {
        let h = TestHarness::new();
        let a = h.add_variant(1, 1000, 5).await;
        let b = h.add_variant(2, 500, 5).await;
        let buyer = user();
        h.cart.add_line(buyer.clone(), a, 2);
        h.cart.add_line(buyer.clone(), b, 1);
        h.store.fail_on(step);

        let err = h.checkout(&buyer).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Persistence(_)), "{step:?}: {err:?}");
        assert!(err.is_retryable(), "{step:?}");
        assert_eq!(h.stock(a).await, 5, "{step:?}");
        assert_eq!(h.stock(b).await, 5, "{step:?}");
        assert_eq!(h.store.order_count().await, 0, "{step:?}");
        assert_eq!(h.store.order_item_count().await, 0, "{step:?}");
        assert_eq!(h.store.history_count().await, 0, "{step:?}");
        assert_eq!(h.cart.lines(&buyer).len(), 2, "{step:?}");
    }
}

#[tokio::test]
async fn test_invalid_adjustments_roll_back() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 2);

    let too_much = request(buyer.clone()).with_discount(Money::from_cents(2001));
    let err = h.coordinator.checkout(too_much).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidAdjustment(_)));

    let negative_fee = request(buyer.clone()).with_shipping_fee(Money::from_cents(-1));
    let err = h.coordinator.checkout(negative_fee).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidAdjustment(_)));

    let overflowing_fee =
        request(buyer.clone()).with_shipping_fee(Money::from_cents(i64::MAX));
    let err = h.coordinator.checkout(overflowing_fee).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidAdjustment(_)), "{err:?}");
    assert!(!err.is_retryable());

    assert_eq!(h.stock(variant).await, 5);
    assert_eq!(h.store.order_count().await, 0);

    let full_discount = request(buyer).with_discount(Money::from_cents(2000));
    let order = h.coordinator.checkout(full_discount).await.unwrap();
    assert_eq!(order.totals.grand_total, Money::zero());
}

#[tokio::test]
async fn test_blank_shipping_field_is_rejected() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 1);

    let mut address = shipping();
    address.postal_code = String::new();
    let err = h
        .coordinator
        .checkout(CheckoutRequest::new(buyer, address, card()))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::InvalidShipping { field: "postal_code" }));
    assert_eq!(h.stock(variant).await, 5);
}

#[tokio::test]
async fn test_timeout_rolls_back_partial_reservation() {
    let h = TestHarness::with_settings(CheckoutSettings {
        timeout: Duration::from_millis(120),
        ..CheckoutSettings::default()
    });
    let variant = h.add_variant(1, 1000, 5).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 2);

    // Reserve, lookup and numbering each take 50ms: the body outlives the timeout
    // after the stock has been taken.
    h.store.set_operation_delay(Some(Duration::from_millis(50)));
    let err = h.checkout(&buyer).await.unwrap_err();
    h.store.set_operation_delay(None);

    assert!(matches!(err, CheckoutError::Timeout(_)));
    assert!(err.is_retryable());
    assert_eq!(h.stock(variant).await, 5);
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_cart_clear_is_retried() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 1);
    h.cart.fail_next_clears(2);

    h.checkout(&buyer).await.unwrap();

    assert_eq!(h.cart.clear_calls(), 3);
    assert!(h.cart.lines(&buyer).is_empty());
}

#[tokio::test]
async fn test_cart_clear_failure_never_undoes_the_order() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 1);
    h.cart.fail_next_clears(10);

    let order = h.checkout(&buyer).await.unwrap();

    assert_eq!(h.cart.clear_calls(), 3);
    assert_eq!(h.cart.lines(&buyer).len(), 1);
    assert_eq!(h.stock(variant).await, 4);
    assert_eq!(h.lifecycle.get_order(order.id).await.unwrap().id, order.id);
}

#[tokio::test]
async fn test_collaborator_failures_are_retryable() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 1);

    h.cart.set_fail_on_snapshot(true);
    let err = h.checkout(&buyer).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Collaborator(_)));
    assert!(err.is_retryable());
    h.cart.set_fail_on_snapshot(false);

    h.payment_methods.set_fail_on_lookup(true);
    let err = h.checkout(&buyer).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Collaborator(_)));
    h.payment_methods.set_fail_on_lookup(false);

    assert!(h.checkout(&buyer).await.is_ok());
}

#[tokio::test]
async fn test_duplicate_cart_lines_are_merged_in_variant_order() {
    let h = TestHarness::new();
    let a = h.add_variant(1, 100, 10).await;
    let b = h.add_variant(2, 200, 10).await;
    let buyer = user();
    h.cart.set_lines(
        buyer.clone(),
        vec![
            CartLine::new(b, 1),
            CartLine::new(a, 2),
            CartLine::new(b, 2),
        ],
    );

    let order = h.checkout(&buyer).await.unwrap();

    let lines: Vec<_> = order
        .items
        .iter()
        .map(|item| (item.variant_id, item.quantity))
        .collect();
    assert_eq!(lines, vec![(a, 2), (b, 3)]);
    assert_eq!(h.stock(a).await, 8);
    assert_eq!(h.stock(b).await, 7);
    assert_eq!(order.totals.subtotal, Money::from_cents(800));
}

#[tokio::test]
async fn test_guest_checkout() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;
    let guest = BuyerIdentity::Guest(SessionId::new("anon-42"));
    h.cart.add_line(guest.clone(), variant, 1);

    let order = h.checkout(&guest).await.unwrap();

    assert_eq!(order.buyer, guest);
    let history = h.lifecycle.list_history(order.id).await.unwrap();
    assert_eq!(history[0].actor_id, None);
}

#[tokio::test]
async fn test_order_codes_are_unique_per_strategy() {
    for strategy in [OrderCodeStrategy::Sequence, OrderCodeStrategy::Random] {
        let h = TestHarness::with_settings(CheckoutSettings {
            order_code_strategy: strategy,
            order_code_prefix: "SHOP".to_string(),
            ..CheckoutSettings::default()
        });
        let variant = h.add_variant(1, 100, 100).await;

        let mut codes = std::collections::HashSet::new();
        for _ in 0..20 {
            let buyer = user();
            h.cart.add_line(buyer.clone(), variant, 1);
            let order = h.checkout(&buyer).await.unwrap();
            assert!(order.code.as_str().starts_with("SHOP-"));
            assert!(codes.insert(order.code));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_oversell() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;

    let buyers: Vec<_> = (0..20).map(|_| user()).collect();
    for buyer in &buyers {
        h.cart.add_line(buyer.clone(), variant, 1);
    }

    let attempts = buyers.iter().map(|buyer| {
        let coordinator = h.coordinator.clone();
        let buyer = buyer.clone();
        tokio::spawn(async move { coordinator.checkout(request(buyer)).await })
    });
    let results = futures_util::future::join_all(attempts).await;

    let mut placed = 0;
    let mut unavailable = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::ItemUnavailable { .. }) => unavailable += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 5);
    assert_eq!(unavailable, 15);
    assert_eq!(h.stock(variant).await, 0);
    assert_eq!(h.store.order_count().await, 5);
}

#[tokio::test]
async fn test_price_change_does_not_alter_placed_order() {
    let h = TestHarness::new();
    let variant = h.add_variant(1, 1000, 5).await;
    let buyer = user();
    h.cart.add_line(buyer.clone(), variant, 2);
    let order = h.checkout(&buyer).await.unwrap();

    assert!(h.store.set_selling_price(variant, Money::from_cents(9999)).await);

    let reloaded = h.lifecycle.get_order(order.id).await.unwrap();
    assert_eq!(reloaded.items[0].unit_price, Money::from_cents(1000));
    assert_eq!(reloaded.items[0].line_total, Money::from_cents(2000));
    assert_eq!(reloaded.totals, order.totals);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_processing_cannot_jump_to_delivered() {
    let h = TestHarness::new();
    let (order, _, _) = h.place_two_line_order().await;
    h.drive(order.id, &[OrderStatus::Processing]).await;

    let err = h
        .lifecycle
        .transition(order.id, OrderStatus::Delivered, None, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::InvalidTransition {
            current: OrderStatus::Processing,
            target: OrderStatus::Delivered,
        }
    ));
    let reloaded = h.lifecycle.get_order(order.id).await.unwrap();
    assert_eq!(reloaded.status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_every_disallowed_transition_is_rejected_without_side_effects() {
    for (from, path) in paths() {
        for target in OrderStatus::ALL {
            if from.can_transition_to(target) {
                continue;
            }

            let h = TestHarness::new();
            let (order, a, b) = h.place_two_line_order().await;
            h.drive(order.id, &path).await;

            let stock_before = (h.stock(a).await, h.stock(b).await);
            let history_before = h.store.history_count().await;

            let err = h
                .lifecycle
                .transition(order.id, target, Some(ActorId::new()), None)
                .await
                .unwrap_err();

            if target == from {
                assert!(matches!(err, LifecycleError::NoOpTransition { .. }), "{from} -> {target}");
            } else {
                assert!(
                    matches!(err, LifecycleError::InvalidTransition { current, target: t } if current == from && t == target),
                    "{from} -> {target}: {err:?}"
                );
            }

            assert_eq!(h.lifecycle.get_order(order.id).await.unwrap().status, from);
            assert_eq!((h.stock(a).await, h.stock(b).await), stock_before);
            assert_eq!(h.store.history_count().await, history_before);
        }
    }
}

#[tokio::test]
async fn test_every_allowed_transition_is_applied() {
    for (from, path) in paths() {
        for &target in from.allowed_targets() {
            let h = TestHarness::new();
            let (order, _, _) = h.place_two_line_order().await;
            h.drive(order.id, &path).await;

            let updated = h
                .lifecycle
                .transition(order.id, target, None, None)
                .await
                .unwrap();

            assert_eq!(updated.status, target, "{from} -> {target}");
            let history = h.lifecycle.list_history(order.id).await.unwrap();
            let last = history.last().unwrap();
            assert_eq!(last.previous_status, Some(from));
            assert_eq!(last.new_status, target);
        }
    }
}

#[tokio::test]
async fn test_cancel_releases_exact_quantities_once() {
    let h = TestHarness::new();
    let (order, a, b) = h.place_two_line_order().await;
    assert_eq!((h.stock(a).await, h.stock(b).await), (7, 8));

    h.lifecycle
        .transition(order.id, OrderStatus::Cancelled, None, Some("buyer request".into()))
        .await
        .unwrap();
    assert_eq!((h.stock(a).await, h.stock(b).await), (10, 10));

    let again = h
        .lifecycle
        .transition(order.id, OrderStatus::Cancelled, None, None)
        .await;
    assert!(matches!(again, Err(LifecycleError::NoOpTransition { .. })));

    let returned = h
        .lifecycle
        .transition(order.id, OrderStatus::Returned, None, None)
        .await;
    assert!(matches!(returned, Err(LifecycleError::InvalidTransition { .. })));

    assert_eq!((h.stock(a).await, h.stock(b).await), (10, 10));
}

#[tokio::test]
async fn test_return_after_delivery_releases_stock() {
    let h = TestHarness::new();
    let (order, a, b) = h.place_two_line_order().await;
    h.drive(
        order.id,
        &[OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered],
    )
    .await;
    assert_eq!((h.stock(a).await, h.stock(b).await), (7, 8));

    h.lifecycle
        .transition(order.id, OrderStatus::Returned, None, None)
        .await
        .unwrap();

    assert_eq!((h.stock(a).await, h.stock(b).await), (10, 10));
}

#[tokio::test]
async fn test_failed_release_rolls_back_cancellation() {
    let h = TestHarness::new();
    let (order, a, _) = h.place_two_line_order().await;
    h.store.fail_on(FailPoint::Release);

    let err = h
        .lifecycle
        .transition(order.id, OrderStatus::Cancelled, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Persistence(_)));
    assert!(err.is_retryable());

    h.store.clear_failure(FailPoint::Release);
    assert_eq!(
        h.lifecycle.get_order(order.id).await.unwrap().status,
        OrderStatus::PendingConfirmation
    );
    assert_eq!(h.stock(a).await, 7);
    assert_eq!(h.lifecycle.list_history(order.id).await.unwrap().len(), 1);

    h.lifecycle
        .transition(order.id, OrderStatus::Cancelled, None, None)
        .await
        .unwrap();
    assert_eq!(h.stock(a).await, 10);
}

#[tokio::test]
async fn test_history_records_actor_and_notes() {
    let h = TestHarness::new();
    let (order, _, _) = h.place_two_line_order().await;
    let operator = ActorId::new();

    h.lifecycle
        .transition(
            order.id,
            OrderStatus::Processing,
            Some(operator),
            Some("picked".to_string()),
        )
        .await
        .unwrap();
    h.lifecycle
        .transition(order.id, OrderStatus::Shipped, Some(operator), None)
        .await
        .unwrap();

    let history = h.lifecycle.list_history(order.id).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|h| h.new_status).collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::PendingConfirmation,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ]
    );
    assert_eq!(history[1].actor_id, Some(operator));
    assert_eq!(history[1].notes.as_deref(), Some("picked"));
    assert!(history.windows(2).all(|w| w[0].recorded_at <= w[1].recorded_at));
}

#[tokio::test]
async fn test_unknown_order() {
    let h = TestHarness::new();
    let missing = OrderId::new();

    assert!(matches!(
        h.lifecycle.get_order(missing).await,
        Err(LifecycleError::OrderNotFound(id)) if id == missing
    ));
    assert!(matches!(
        h.lifecycle.list_history(missing).await,
        Err(LifecycleError::OrderNotFound(_))
    ));
    assert!(matches!(
        h.lifecycle
            .transition(missing, OrderStatus::Processing, None, None)
            .await,
        Err(LifecycleError::OrderNotFound(_))
    ));
}

#[tokio::test]
async fn test_record_payment_leaves_order_status_alone() {
    let h = TestHarness::new();
    let (order, _, _) = h.place_two_line_order().await;

    let paid = h
        .lifecycle
        .record_payment(order.id, PaymentStatus::Paid, None)
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.status, OrderStatus::PendingConfirmation);

    let refunded = h
        .lifecycle
        .record_payment(order.id, PaymentStatus::Refunded, None)
        .await
        .unwrap();
    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);

    let err = h
        .lifecycle
        .record_payment(order.id, PaymentStatus::Paid, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidPaymentTransition {
            current: PaymentStatus::Refunded,
            target: PaymentStatus::Paid,
        }
    ));

    // Payment changes are not status transitions.
    assert_eq!(h.lifecycle.list_history(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_payment_can_be_retried() {
    let h = TestHarness::new();
    let (order, _, _) = h.place_two_line_order().await;

    h.lifecycle
        .record_payment(order.id, PaymentStatus::Failed, None)
        .await
        .unwrap();
    let order = h
        .lifecycle
        .record_payment(order.id, PaymentStatus::Paid, None)
        .await
        .unwrap();

    assert_eq!(order.payment_status, PaymentStatus::Paid);
}
