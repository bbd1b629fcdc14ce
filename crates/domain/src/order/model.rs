//! Order records: the order header, its line snapshots and the status log.

use chrono::{DateTime, Utc};
use common::{ActorId, BuyerIdentity, OrderId, PaymentMethodId, VariantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::ProductVariant;

use super::{Money, OrderCode, OrderError, OrderStatus, PaymentStatus, ShippingInfo};

/// Immutable snapshot of one purchased line.
///
/// Name, SKU and price are copied from the catalog at reservation time so
/// later catalog edits never rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: OrderId,
    pub variant_id: VariantId,
    pub product_name: String,
    pub sku: String,
    /// Unit price at purchase.
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

impl OrderItem {
    /// Captures a line from the variant as it looks right now.
    pub fn snapshot(
        order_id: OrderId,
        variant: &ProductVariant,
        quantity: u32,
    ) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity });
        }

        let line_total = variant
            .selling_price
            .checked_multiply(quantity)
            .ok_or(OrderError::AmountOverflow("line total"))?;

        Ok(Self {
            id: Uuid::new_v4(),
            order_id,
            variant_id: variant.id,
            product_name: variant.product_name.clone(),
            sku: variant.sku.clone(),
            unit_price: variant.selling_price,
            quantity,
            line_total,
        })
    }
}

/// Monetary totals of an order.
///
/// Always satisfies `grand_total = subtotal - discount + shipping_fee`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping_fee: Money,
    pub grand_total: Money,
}

impl OrderTotals {
    /// Derives the grand total from externally supplied adjustments.
    pub fn compute(
        subtotal: Money,
        discount: Money,
        shipping_fee: Money,
    ) -> Result<Self, OrderError> {
        if discount.is_negative() {
            return Err(OrderError::InvalidAdjustment(format!(
                "discount {discount} is negative"
            )));
        }
        if shipping_fee.is_negative() {
            return Err(OrderError::InvalidAdjustment(format!(
                "shipping fee {shipping_fee} is negative"
            )));
        }
        if discount > subtotal {
            return Err(OrderError::InvalidAdjustment(format!(
                "discount {discount} exceeds subtotal {subtotal}"
            )));
        }

        let grand_total = subtotal
            .checked_sub(discount)
            .and_then(|net| net.checked_add(shipping_fee))
            .ok_or_else(|| {
                OrderError::InvalidAdjustment(format!(
                    "shipping fee {shipping_fee} overflows the order total"
                ))
            })?;

        Ok(Self {
            subtotal,
            discount,
            shipping_fee,
            grand_total,
        })
    }

    /// Re-checks the grand total identity.
    pub fn verify(&self) -> Result<(), OrderError> {
        let expected = self
            .subtotal
            .checked_sub(self.discount)
            .and_then(|net| net.checked_add(self.shipping_fee));

        if expected != Some(self.grand_total) {
            return Err(OrderError::TotalsMismatch(format!(
                "grand total {} != {} - {} + {}",
                self.grand_total, self.subtotal, self.discount, self.shipping_fee
            )));
        }

        Ok(())
    }
}

/// Everything checkout knows about an order before it is placed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub code: OrderCode,
    pub buyer: BuyerIdentity,
    pub payment_method_id: PaymentMethodId,
    pub shipping: ShippingInfo,
    pub notes: Option<String>,
    pub discount: Money,
    pub shipping_fee: Money,
    pub placed_at: DateTime<Utc>,
}

/// A placed order together with its line snapshots.
///
/// `status` is only changed through [`Order::transition_to`] and
/// `payment_status` only through [`Order::record_payment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub code: OrderCode,
    pub buyer: BuyerIdentity,
    pub payment_method_id: PaymentMethodId,
    pub shipping: ShippingInfo,
    pub notes: Option<String>,
    pub totals: OrderTotals,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Builds a freshly placed order in `PendingConfirmation` / `Pending`.
    pub fn place(new: NewOrder, items: Vec<OrderItem>) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let subtotal = sum_line_totals(&items)?;
        let totals = OrderTotals::compute(subtotal, new.discount, new.shipping_fee)?;

        let order = Self {
            id: new.id,
            code: new.code,
            buyer: new.buyer,
            payment_method_id: new.payment_method_id,
            shipping: new.shipping,
            notes: new.notes,
            totals,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::PendingConfirmation,
            placed_at: new.placed_at,
            updated_at: new.placed_at,
            items,
        };
        order.verify_totals()?;

        Ok(order)
    }

    /// Checks that the header totals agree with the line snapshots.
    pub fn verify_totals(&self) -> Result<(), OrderError> {
        let subtotal = sum_line_totals(&self.items)?;
        if subtotal != self.totals.subtotal {
            return Err(OrderError::TotalsMismatch(format!(
                "subtotal {} != sum of lines {}",
                self.totals.subtotal, subtotal
            )));
        }

        for item in &self.items {
            if item.unit_price.checked_multiply(item.quantity) != Some(item.line_total) {
                return Err(OrderError::TotalsMismatch(format!(
                    "line {} total {} != {} x {}",
                    item.variant_id, item.line_total, item.unit_price, item.quantity
                )));
            }
        }

        self.totals.verify()
    }

    /// The history row written when the order is created.
    pub fn initial_history(&self, actor_id: Option<ActorId>) -> OrderStatusHistory {
        OrderStatusHistory {
            id: Uuid::new_v4(),
            order_id: self.id,
            previous_status: None,
            new_status: self.status,
            notes: Some("Order placed".to_string()),
            actor_id,
            recorded_at: self.placed_at,
        }
    }

    /// Moves the order to `target` if the transition table allows it.
    ///
    /// Returns the history row describing the change.
    pub fn transition_to(
        &mut self,
        target: OrderStatus,
        actor_id: Option<ActorId>,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<OrderStatusHistory, OrderError> {
        self.status.validate_transition(target)?;

        let previous = self.status;
        self.status = target;
        self.updated_at = at;

        Ok(OrderStatusHistory {
            id: Uuid::new_v4(),
            order_id: self.id,
            previous_status: Some(previous),
            new_status: target,
            notes,
            actor_id,
            recorded_at: at,
        })
    }

    /// Records a payment outcome, returning the previous payment status.
    pub fn record_payment(
        &mut self,
        target: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<PaymentStatus, OrderError> {
        self.payment_status.validate_transition(target)?;

        let previous = self.payment_status;
        self.payment_status = target;
        self.updated_at = at;
        Ok(previous)
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

fn sum_line_totals(items: &[OrderItem]) -> Result<Money, OrderError> {
    items.iter().try_fold(Money::zero(), |acc, item| {
        acc.checked_add(item.line_total)
            .ok_or(OrderError::AmountOverflow("subtotal"))
    })
}

/// One row of the append-only status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusHistory {
    pub id: Uuid,
    pub order_id: OrderId,
    /// `None` for the row written at creation.
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub notes: Option<String>,
    pub actor_id: Option<ActorId>,
    pub recorded_at: DateTime<Utc>,
}
