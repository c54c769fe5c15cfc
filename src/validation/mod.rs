//! Public validation read path.
//!
//! [`ValidationGateway`] answers validation-page lookups with a sanitized
//! document and its signing events, behind an optional access code and
//! per-IP [`FixedWindowLimiter`]s.

mod gateway;
mod rate_limit;

pub use gateway::{CodeSubmission, ValidationGateway, ValidationOutcome};
pub use rate_limit::FixedWindowLimiter;
