//! Core data models for the object gateway.
//!
//! None of these are persisted by the gateway itself: object state lives in
//! the backing store and grants are validated by the store's signatures.

pub mod grant;
pub mod object;
