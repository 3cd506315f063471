//! Bilibili API module.
//!
//! This module provides:
//! - HTTP client for metadata and play-URL endpoints
//! - WBI and app-key query signing
//! - API response types

pub mod client;
pub mod sign;
pub mod types;

pub use client::{BiliApi, PlayTarget};
pub use sign::{AppKeySigner, NoSigner, QuerySigner, WbiSigner};
pub use types::*;
