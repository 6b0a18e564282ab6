use chrono::{DateTime, Utc};
use feira_core::identity::AddressSnapshot;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raised when a stored status string no longer matches any known variant.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Order lifecycle. The wire strings are part of the client contract and
/// are stored verbatim in the status column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    #[serde(rename = "Pending Payment")]
    PendingPayment,
    Processing,
    Delivering,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "Pending Payment",
            OrderStatus::Processing => "Processing",
            OrderStatus::Delivering => "Delivering",
            OrderStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending Payment" => Ok(OrderStatus::PendingPayment),
            "Processing" => Ok(OrderStatus::Processing),
            "Delivering" => Ok(OrderStatus::Delivering),
            "Completed" => Ok(OrderStatus::Completed),
            other => Err(ParseEnumError {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// Delivery record lifecycle, advanced one guarded transition at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryStatus {
    Requested,
    Accepted,
    PickedUp,
    #[serde(rename = "Delivered_Confirmed")]
    DeliveredConfirmed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Requested => "Requested",
            DeliveryStatus::Accepted => "Accepted",
            DeliveryStatus::PickedUp => "PickedUp",
            DeliveryStatus::DeliveredConfirmed => "Delivered_Confirmed",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Requested" => Ok(DeliveryStatus::Requested),
            "Accepted" => Ok(DeliveryStatus::Accepted),
            "PickedUp" => Ok(DeliveryStatus::PickedUp),
            "Delivered_Confirmed" => Ok(DeliveryStatus::DeliveredConfirmed),
            other => Err(ParseEnumError {
                kind: "delivery status",
                value: other.to_string(),
            }),
        }
    }
}

/// Who carries the package to the buyer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryMethod {
    /// Any available platform courier can claim the job.
    Marketplace,
    /// The store's own contracted courier is assigned directly.
    Contracted,
    /// The seller delivers it themselves.
    Seller,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Marketplace => "Marketplace",
            DeliveryMethod::Contracted => "Contracted",
            DeliveryMethod::Seller => "Seller",
        }
    }

    /// Whether this method ties up a platform courier that settlement
    /// must release.
    pub fn uses_courier(&self) -> bool {
        matches!(self, DeliveryMethod::Marketplace | DeliveryMethod::Contracted)
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Marketplace" => Ok(DeliveryMethod::Marketplace),
            "Contracted" => Ok(DeliveryMethod::Contracted),
            "Seller" => Ok(DeliveryMethod::Seller),
            other => Err(ParseEnumError {
                kind: "delivery method",
                value: other.to_string(),
            }),
        }
    }
}

/// A buyer's purchase from one store, with the delivery address frozen at
/// checkout time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub store_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub delivery_method: Option<DeliveryMethod>,
    /// Payment provider reference; a placeholder until the preference exists.
    pub payment_reference: String,
    /// Handed over by the buyer to whoever delivers; completes the order.
    pub delivery_code: String,
    /// Presented by the courier at the store to collect the package.
    pub pickup_code: String,
    pub address: AddressSnapshot,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line in an order; name and unit price are snapshots so later
/// catalog edits never change what the buyer agreed to pay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub selected_options: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// The courier-side record of an order in flight. One per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub status: DeliveryStatus,
    pub method: DeliveryMethod,
    pub packing_started_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub buyer_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
