//! # auth-adapters
//!
//! Token verification and the `AuthAdmin` port.
//!
//! - [`JwtVerifier`] / [`JwtIssuer`]: HS256 access tokens.
//! - [`MemoryAuth`]: Argon2-hashed users in memory.
//! - `GoTrueAdmin` (feature `gotrue`): Supabase Auth.

pub mod jwt;
pub mod memory;

#[cfg(feature = "gotrue")]
pub mod gotrue;

pub use jwt::{Claims, JwtIssuer, JwtVerifier};
pub use memory::MemoryAuth;

#[cfg(feature = "gotrue")]
pub use gotrue::GoTrueAdmin;
