use crate::models::OrderStatus;
use crate::repository::{BeginOrderError, DraftItem, OrderDraft, OrderStore};
use crate::settlement;
use feira_catalog::pricing::{CartLine, PricingEngine};
use feira_catalog::product::{CatalogReader, ProductSnapshot};
use feira_core::identity::{CallerProfile, PartyDirectory};
use feira_core::payment::{PaymentGateway, PreferenceRequest};
use feira_core::{CoreError, CoreResult};
use feira_shared::pii::Masked;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Reference stored while the real one is being obtained from the provider.
const PLACEHOLDER_PAYMENT_REF: &str = "TEMP_MP_ID";
/// Reference marking orders created through the simulated checkout.
const SIMULATED_PAYMENT_REF: &str = "SIMULATED_PURCHASE";

/// What the buyer gets back from checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    /// Payment-provider redirect; absent for simulated purchases.
    pub init_point: Option<String>,
}

/// Creates orders: prices the cart, stages everything in one transaction,
/// obtains the payment preference while the transaction is open, and commits
/// only when all of it held together.
pub struct CheckoutService {
    catalog: Arc<dyn CatalogReader>,
    directory: Arc<dyn PartyDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
    pricing: Arc<PricingEngine>,
    fee_rate: Decimal,
    code_retry_attempts: u32,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<dyn CatalogReader>,
        directory: Arc<dyn PartyDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        pricing: Arc<PricingEngine>,
        fee_rate: Decimal,
        code_retry_attempts: u32,
    ) -> Self {
        Self {
            catalog,
            directory,
            gateway,
            orders,
            pricing,
            fee_rate,
            code_retry_attempts,
        }
    }

    /// Real checkout: order starts in `Pending Payment` and the buyer is
    /// redirected to the provider.
    pub async fn checkout(
        &self,
        buyer: &CallerProfile,
        lines: &[CartLine],
    ) -> CoreResult<CheckoutReceipt> {
        let staged = self.stage(buyer, lines, OrderStatus::PendingPayment).await?;

        let preference_request = PreferenceRequest {
            order_id: staged.draft.order_id,
            title: format!("Order #{}", staged.draft.order_id.simple()),
            total_amount: staged.draft.total_amount,
            marketplace_fee: settlement::split(staged.draft.total_amount, self.fee_rate)
                .marketplace_fee,
            payer_email: buyer.email.clone(),
            seller_credential: staged.seller_credential.clone(),
        };

        let attempt = self.begin_with_retry(staged.draft.clone()).await?;
        let pending = attempt.pending;
        let draft = attempt.draft;

        let preference = match self.gateway.create_preference(&preference_request).await {
            Ok(preference) => preference,
            Err(err) => {
                if let Err(abort_err) = pending.abort().await {
                    tracing::error!(
                        order_id = %draft.order_id,
                        error = %abort_err,
                        "failed to roll back staged order after gateway failure"
                    );
                }
                return Err(err);
            }
        };

        pending.commit(&preference.preference_id).await?;

        tracing::info!(
            order_id = %draft.order_id,
            total = %draft.total_amount,
            "order created, awaiting payment"
        );

        Ok(CheckoutReceipt {
            order_id: draft.order_id,
            total_amount: draft.total_amount,
            status: OrderStatus::PendingPayment,
            init_point: Some(preference.init_point),
        })
    }

    /// Simulated checkout: no provider involved, order lands in `Processing`.
    pub async fn checkout_simulated(
        &self,
        buyer: &CallerProfile,
        lines: &[CartLine],
    ) -> CoreResult<CheckoutReceipt> {
        let bundle = self.build_draft(buyer, lines, OrderStatus::Processing).await?;

        let attempt = self.begin_with_retry(bundle.draft).await?;
        attempt.pending.commit(SIMULATED_PAYMENT_REF).await?;

        tracing::info!(order_id = %attempt.draft.order_id, "simulated order created");

        Ok(CheckoutReceipt {
            order_id: attempt.draft.order_id,
            total_amount: attempt.draft.total_amount,
            status: OrderStatus::Processing,
            init_point: None,
        })
    }

    /// Payment-provider confirmation seam: move the matching order from
    /// `Pending Payment` to `Processing`. Returns whether anything moved,
    /// so replayed notifications are harmless.
    pub async fn confirm_payment(&self, payment_reference: &str) -> CoreResult<bool> {
        let moved = self.orders.confirm_payment(payment_reference).await?;
        if moved {
            tracing::info!(payment_reference, "payment confirmed, order moved to processing");
        } else {
            tracing::debug!(payment_reference, "payment confirmation matched no pending order");
        }
        Ok(moved)
    }

    /// Shared staging path: price, enforce the one-store rule, snapshot the
    /// address, build the draft. Returns the draft plus the seller credential
    /// the real checkout needs for the provider call.
    async fn stage(
        &self,
        buyer: &CallerProfile,
        lines: &[CartLine],
        initial_status: OrderStatus,
    ) -> CoreResult<StagedCheckout> {
        let bundle = self.build_draft(buyer, lines, initial_status).await?;

        let seller = self
            .directory
            .load_caller(bundle.seller_id)
            .await?
            .ok_or_else(|| CoreError::Integrity("order references an unknown seller".into()))?;
        let seller_credential = seller.payment_token.clone().ok_or_else(|| {
            CoreError::Upstream("the seller has not connected their payment account".into())
        })?;

        Ok(StagedCheckout {
            draft: bundle.draft,
            seller_credential,
        })
    }

    async fn build_draft(
        &self,
        buyer: &CallerProfile,
        lines: &[CartLine],
        initial_status: OrderStatus,
    ) -> CoreResult<DraftBundle> {
        if lines.is_empty() {
            return Err(CoreError::Validation("Cart is empty.".into()));
        }
        for line in lines {
            if line.quantity < 1 {
                return Err(CoreError::Validation(format!(
                    "Invalid quantity for product {}.",
                    line.product_id
                )));
            }
        }

        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let products = self.catalog.products_for_cart(&ids).await?;
        let breakdown = self.pricing.price_cart(lines, &products, buyer.city_id);

        if breakdown.store_count == 0 {
            return Err(CoreError::Validation("No valid products in cart.".into()));
        }
        if breakdown.store_count != 1 {
            return Err(CoreError::Validation(
                "Please create a separate order for each store.".into(),
            ));
        }

        let address = buyer.address_snapshot()?;

        let by_id: HashMap<Uuid, &ProductSnapshot> = products.iter().map(|p| (p.id, p)).collect();
        let items: Vec<DraftItem> = lines
            .iter()
            .filter_map(|line| {
                by_id.get(&line.product_id).map(|product| DraftItem {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    unit_price: product.unit_price,
                    quantity: line.quantity,
                    selected_options: line.options_or_empty(),
                })
            })
            .collect();

        // store_count == 1 guarantees at least one priced line
        let anchor = items
            .first()
            .and_then(|item| by_id.get(&item.product_id))
            .ok_or_else(|| CoreError::Integrity("priced cart lost its products".into()))?;
        let store_id = anchor.store_id;
        let seller_id = anchor.seller_id;

        Ok(DraftBundle {
            draft: OrderDraft {
                order_id: Uuid::new_v4(),
                buyer_id: buyer.id,
                store_id,
                total_amount: breakdown.grand_total,
                initial_status,
                payment_reference: PLACEHOLDER_PAYMENT_REF.to_string(),
                delivery_code: feira_shared::codes::delivery_code(),
                pickup_code: feira_shared::codes::pickup_code(),
                address,
                items,
            },
            seller_id,
        })
    }

    /// Stage the draft, regenerating codes for a bounded number of attempts
    /// when one collides with an existing order.
    async fn begin_with_retry(&self, mut draft: OrderDraft) -> CoreResult<BeginAttempt> {
        let attempts = self.code_retry_attempts.max(1);
        for attempt in 0..attempts {
            match self.orders.begin_order(draft.clone()).await {
                Ok(pending) => return Ok(BeginAttempt { pending, draft }),
                Err(BeginOrderError::CodeCollision) => {
                    tracing::warn!(
                        order_id = %draft.order_id,
                        attempt,
                        "confirmation code collision, regenerating"
                    );
                    draft.delivery_code = feira_shared::codes::delivery_code();
                    draft.pickup_code = feira_shared::codes::pickup_code();
                }
                Err(BeginOrderError::InsufficientStock {
                    product_name,
                    requested,
                    available,
                }) => {
                    return Err(CoreError::Conflict(format!(
                        "Insufficient stock for {product_name}: requested {requested}, available {available}."
                    )));
                }
                Err(BeginOrderError::Store(err)) => return Err(err),
            }
        }
        Err(CoreError::Integrity(
            "could not allocate unique confirmation codes".into(),
        ))
    }
}

struct StagedCheckout {
    draft: OrderDraft,
    seller_credential: Masked<String>,
}

struct DraftBundle {
    draft: OrderDraft,
    seller_id: Uuid,
}

struct BeginAttempt {
    pending: Box<dyn crate::repository::PendingOrder>,
    draft: OrderDraft,
}
