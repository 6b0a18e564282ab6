use crate::models::{DeliveryStatus, OrderStatus};

/// Renders the buyer-facing progress line shown in order history.
///
/// A seam rather than a function so deployments can swap wording or
/// localization without touching the workflow.
pub trait TrackingFormatter: Send + Sync {
    fn buyer_message(
        &self,
        order_status: OrderStatus,
        delivery_status: Option<DeliveryStatus>,
        courier_name: Option<&str>,
    ) -> String;
}

/// Default wording.
pub struct PlainFormatter;

impl TrackingFormatter for PlainFormatter {
    fn buyer_message(
        &self,
        order_status: OrderStatus,
        delivery_status: Option<DeliveryStatus>,
        courier_name: Option<&str>,
    ) -> String {
        match order_status {
            OrderStatus::PendingPayment => "Waiting for payment confirmation.".to_string(),
            OrderStatus::Processing => "The store is preparing your order.".to_string(),
            OrderStatus::Delivering => match delivery_status {
                None | Some(DeliveryStatus::Requested) => {
                    "Looking for a courier near the store.".to_string()
                }
                Some(DeliveryStatus::Accepted) => match courier_name {
                    Some(name) => format!("{name} is heading to the store."),
                    None => "The store is getting your order ready to go.".to_string(),
                },
                Some(DeliveryStatus::PickedUp) => "Your order is on the way.".to_string(),
                Some(DeliveryStatus::DeliveredConfirmed) => {
                    "Delivery confirmed. Enjoy!".to_string()
                }
            },
            OrderStatus::Completed => "Delivered. Thanks for buying with us!".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_track_progress() {
        let f = PlainFormatter;
        assert!(f
            .buyer_message(OrderStatus::PendingPayment, None, None)
            .contains("payment"));
        assert!(f
            .buyer_message(OrderStatus::Processing, None, None)
            .contains("preparing"));
        assert!(f
            .buyer_message(
                OrderStatus::Delivering,
                Some(DeliveryStatus::Requested),
                None
            )
            .contains("Looking for a courier"));
        assert_eq!(
            f.buyer_message(
                OrderStatus::Delivering,
                Some(DeliveryStatus::Accepted),
                Some("Carlos")
            ),
            "Carlos is heading to the store."
        );
        assert!(f
            .buyer_message(OrderStatus::Completed, None, None)
            .contains("Delivered"));
    }
}
