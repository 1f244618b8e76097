//! # Supabase Provider
//!
//! Implements the `PageSource` trait against a Supabase (PostgREST) backend.
//!
//! ## Overview
//!
//! The backend stores one `manga_pages` row per page image. This crate
//! queries the rows of a chapter, ordered by `page_number`, authenticated
//! with the project's public anon key.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::SupabasePageSource;
pub use error::{Result, SupabaseError};
