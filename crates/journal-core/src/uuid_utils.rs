//! UUID v7 utilities for time-ordered note identifiers.
//!
//! Note ids are opaque strings to the chat engine, but stores that mint their
//! own ids use UUIDv7 so that lexical order follows creation order.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use journal_core::uuid_utils::new_v7;
///
/// let a = new_v7();
/// let b = new_v7();
/// assert!(b > a);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}
