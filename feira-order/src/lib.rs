pub mod checkout;
pub mod models;
pub mod repository;
pub mod settlement;
pub mod tracking;
pub mod workflow;

pub use checkout::{CheckoutReceipt, CheckoutService};
pub use models::{Delivery, DeliveryMethod, DeliveryStatus, Order, OrderItem, OrderStatus};
pub use repository::{
    AcceptDelivery, ActiveJob, BeginOrderError, JobPreview, OrderDraft, OrderHistoryEntry,
    OrderStore, PendingOrder, StartDelivery,
};
pub use settlement::{split, Settlement};
pub use tracking::{PlainFormatter, TrackingFormatter};
pub use workflow::{
    AvailableJobs, BuyerOrderView, ConfirmedDelivery, CurrentDelivery, DeliveryWorkflow,
    StatusSnapshot,
};
