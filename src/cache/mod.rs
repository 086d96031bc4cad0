//! Cache Module
//!
//! The indexing and lookup engine: key scheme, index maintenance, lookup
//! operations, and grouped iteration.

mod groups;
mod indexed;
mod keys;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use groups::Groups;
pub use indexed::{IndexValueFn, IndexedCache, MissResolver, PrimaryKeyFn};
pub use keys::{KeyScheme, MEMBER_UPPER, SEPARATOR};
