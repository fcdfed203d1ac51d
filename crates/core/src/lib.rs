//! `realmgate-core` — shared gateway primitives.
//!
//! This crate holds identifiers and the error taxonomy used by every other
//! crate. It has no transport or storage concerns.

pub mod error;
pub mod id;

pub use error::{GatewayError, GatewayResult};
pub use id::{RealmName, SessionId};
