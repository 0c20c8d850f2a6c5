pub mod authority;
pub mod engine;
pub mod model;
pub mod rate;
pub mod seller;
pub mod store;
