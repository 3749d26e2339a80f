//! Query façade: range-filtered access to the views and diagnostics.

pub mod facade;
pub mod period;
pub mod range;

pub use facade::{QueryContext, ViewName, ViewRows};
pub use period::Period;
pub use range::DateRange;
