// src/pool/mod.rs

//! Bounded resource pool.
//!
//! - [`options`] turns raw configuration values into effective limits.
//! - [`queue`] is the FIFO of pending acquisition requests.
//! - [`resource_pool`] owns the bookkeeping and the acquire/release logic.

pub mod options;
pub mod queue;
pub mod resource_pool;

pub use options::{PoolLimits, PoolOptions};
pub use resource_pool::{Lease, PoolStats, Poolable, ResourcePool, ResourcePoolBuilder};
