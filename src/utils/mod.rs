// Utility functions
// Quantity parsing and validation

pub mod quantity;

pub use quantity::{checked_total, decimal_from_json, ensure_non_negative, ensure_positive, MAX_QUANTITY};
