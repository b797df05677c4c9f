//! Marbelle client SDK.
//!
//! This crate is the client-side session and state-consistency layer for the
//! Marbelle storefront backend:
//!
//! - [`session`] - The authenticated request pipeline. Attaches bearer
//!   credentials, transparently refreshes an expired pair with a single
//!   refresh call no matter how many requests fail at once, and replays
//!   queued requests in arrival order.
//! - [`cart`] - The cart state manager. Applies optimistic local mutations
//!   before server confirmation and rolls back deterministically on failure.
//! - [`services`] - Thin typed wrappers (auth, cart, catalog, dashboard)
//!   over the session client.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use marbelle_client::config::ClientConfig;
//! use marbelle_client::session::{MemoryCredentialStore, SessionClient};
//! use marbelle_client::services::{AuthService, CartService};
//! use marbelle_client::cart::CartManager;
//!
//! let config = ClientConfig::from_env()?;
//! let session = SessionClient::new(&config, Arc::new(MemoryCredentialStore::new()));
//!
//! let auth = AuthService::new(session.clone());
//! auth.login("ada@example.com", "correct horse").await?;
//!
//! let cart = CartManager::new(CartService::new(session.clone()));
//! cart.load().await?;
//! cart.add_item(product_id, 2).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod services;
pub mod session;

pub use error::ApiError;
