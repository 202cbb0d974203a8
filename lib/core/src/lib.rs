//! Core domain types and utilities for the atelier storefront.
//!
//! This crate provides the foundational identity type and error handling
//! alias shared by the platform-access library and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{OpenId, ParseIdError};
