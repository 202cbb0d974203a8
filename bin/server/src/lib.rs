//! atelier identity server.
//!
//! This crate provides the HTTP surface of the storefront's identity layer:
//! the OAuth callback, session cookies, and per-request authentication.

pub mod app;
pub mod auth;
pub mod config;
