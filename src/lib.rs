//! orderflow — order fulfillment and payment settlement core.
//!
//! Turns a cart of line items into a persisted order with reserved inventory,
//! drives that order through a bounded status lifecycle, and interoperates
//! with an external payment gateway via a signed redirect/callback protocol.
//!
//! Persistence is abstracted behind [`store::Store`]; every order-affecting
//! operation (create, cancel, status update, callback) runs as a single
//! transaction so stock and order state stay consistent under concurrency.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod logging;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use errors::ServiceError;
