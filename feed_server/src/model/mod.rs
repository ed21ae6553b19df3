//! Domain models of the feed server.
//!
//! - `catalog` — supported instruments and symbol resolution.
//! - `price_model` — synthetic quote computation.
//! - `quote_book` — latest broadcast quote per symbol.
//! - `sink` — subscriber delivery endpoints.
//! - `registry` — per-symbol subscriber sets.

pub mod catalog;
pub mod price_model;
pub mod quote_book;
pub mod registry;
pub mod sink;
