//! Demo data for running the server without a database.

use checkout::{InMemoryCart, InMemoryPaymentMethods};
use common::{BuyerIdentity, PaymentMethodId, SessionId, VariantId};
use domain::{Money, ProductVariant};
use store::MemoryStore;

/// Guest session whose cart is pre-filled by [`seed`].
pub const DEMO_SESSION: &str = "demo-session";

/// Payment method registered by [`seed`].
pub const DEMO_PAYMENT_METHOD: i64 = 1;

/// Fills the in-memory backends with a small catalog, one payment method and
/// a guest cart, so `POST /checkout` works out of the box.
pub async fn seed(
    store: &MemoryStore,
    cart: &InMemoryCart,
    payment_methods: &InMemoryPaymentMethods,
) {
    let catalog = [
        (1, "Espresso Beans 1kg", "COF-ESP-1KG", 2450, 25),
        (2, "Ceramic Mug", "MUG-CER-350", 1200, 40),
        (3, "Pour-over Kettle", "KTL-POUR-1L", 5900, 5),
    ];

    for (id, name, sku, price_cents, stock) in catalog {
        store
            .insert_variant(ProductVariant {
                id: VariantId::new(id),
                product_name: name.to_string(),
                sku: sku.to_string(),
                selling_price: Money::from_cents(price_cents),
                stock_quantity: stock,
                is_active: true,
            })
            .await;
    }

    payment_methods.register(PaymentMethodId::new(DEMO_PAYMENT_METHOD));

    let buyer = BuyerIdentity::Guest(SessionId::new(DEMO_SESSION));
    cart.add_line(buyer.clone(), VariantId::new(1), 1);
    cart.add_line(buyer, VariantId::new(2), 2);

    tracing::info!(
        variants = catalog.len(),
        session_id = DEMO_SESSION,
        payment_method_id = DEMO_PAYMENT_METHOD,
        "seeded demo data"
    );
}
