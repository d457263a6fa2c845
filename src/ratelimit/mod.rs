//! Rate limiting policy engine and counter stores.

mod limiter;
mod local;
mod policy;
mod shared;
mod store;

pub use limiter::{Decision, RateLimiter};
pub use local::LocalCounterStore;
pub use policy::{PolicySet, RateLimitPolicy};
pub use shared::SharedCounterStore;
pub use store::{CounterStore, CounterStoreKind, WindowCount};
