//! Client-side message reconciliation.
//!
//! A UI keeps one [`Thread`] per open conversation. Sends are appended
//! optimistically, confirmed against the REST response, and deduplicated
//! against the gateway echo; reconnects of the live channel follow the
//! [`Backoff`] policy.

pub mod backoff;
pub mod reconcile;

pub use backoff::Backoff;
pub use reconcile::{DeliveryState, Thread, ThreadEntry};
