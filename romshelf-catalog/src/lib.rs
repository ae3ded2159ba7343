//! HTTP client for the external game metadata catalog.
//!
//! Implements [`romshelf_core::Catalog`] over the catalog's JSON search
//! API with client-side rate limiting — the catalog throttles on its side,
//! so we space our requests rather than burn quota on 429 responses.

pub mod client;

pub use client::CatalogClient;
