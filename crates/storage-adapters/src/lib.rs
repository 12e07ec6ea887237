//! # storage-adapters
//!
//! Implementations of the persistence ports from `domains`.
//!
//! - [`memory::MemoryStore`]: everything in process memory; local runs and tests.
//! - `supabase::SupabaseStore` (feature `supabase`): PostgREST tables and
//!   Storage buckets of a Supabase project.

pub mod memory;

#[cfg(feature = "supabase")]
pub mod supabase;

pub use memory::MemoryStore;

#[cfg(feature = "supabase")]
pub use supabase::{SupabaseClient, SupabaseStore};
