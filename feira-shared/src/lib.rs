pub mod codes;
pub mod money;
pub mod pii;

pub use codes::{delivery_code, pickup_code};
pub use money::round2;
