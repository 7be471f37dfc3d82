//! Seine is a message-driven interpolation-target protocol for distributed
//! mesh simulation codes. Solution data scattered across many producer
//! elements is gathered, accumulated, and validated against time-dependent
//! coordinate maps, then delivered as a complete set of interpolated field
//! values to a callback. Per-target state machines track the lifecycle of
//! each requested simulation time and stay correct under partial,
//! out-of-order, and duplicate contributions arriving asynchronously from
//! the producers.

pub mod accumulator;
pub mod error;
pub mod exchange;
pub mod interpolator;
pub mod pool;
pub mod queue;
pub mod readiness;
pub mod relay;
pub mod stats;
pub mod target;
pub mod temporal;
pub mod vars;
