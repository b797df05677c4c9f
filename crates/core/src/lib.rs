//! Marbelle Core - Shared types library.
//!
//! This crate provides common types used across the Marbelle client SDK:
//! - `client` - Session pipeline, domain services, and cart state manager
//! - `integration-tests` - End-to-end tests against a stub backend
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, email addresses, cart domain types, user profile

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
