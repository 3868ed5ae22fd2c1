//! Shared type definitions for drift
//!
//! - [`Dialect`] - Database dialect enum (SQLite, PostgreSQL, MySQL, DSQL)
//!
//! # Features
//!
//! - `std` - Standard library support (enabled by default)
//! - `alloc` - Allocator support for no_std environments
//! - `serde` - Enable serde serialization/deserialization

#![cfg_attr(not(feature = "std"), no_std)]

mod dialect;

pub use dialect::{Dialect, DialectParseError};
