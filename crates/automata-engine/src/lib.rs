//! The two parallel step engines: [`shared::SharedBarrierEngine`] (one grid,
//! disjoint linear ranges, a barrier) and [`halo::HaloExchangeEngine`] (one
//! subgrid per worker, ghost rows refreshed by message between steps).
//!
//! Both collapse to [`sequential::run`] when `workers == 1`, and both
//! propagate a panicking rule up through `run` instead of deadlocking their
//! peers — see each module's docs for how.

mod rendezvous;
pub mod sequential;

pub mod halo;
pub mod shared;

pub use halo::HaloExchangeEngine;
pub use shared::SharedBarrierEngine;
