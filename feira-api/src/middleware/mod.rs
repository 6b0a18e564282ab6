pub mod auth;

pub use auth::{
    any_auth_middleware, buyer_auth_middleware, courier_auth_middleware, seller_auth_middleware,
    Claims,
};
