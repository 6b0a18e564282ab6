pub mod pricing;
pub mod product;
pub mod shipping;

pub use pricing::{CartBreakdown, CartLine, PricingEngine};
pub use product::{CatalogReader, ProductSnapshot, StorefrontInfo};
pub use shipping::{ShippingOption, ShippingOptions};
