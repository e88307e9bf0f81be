//! `iacp-auth`: credential and token primitives.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod expiry;
pub mod password;
pub mod token;

pub use claims::{
    build_payload, ClaimConfigPatch, ClaimConfiguration, TokenClaims, DEFAULT_TOKEN_EXPIRY,
};
pub use expiry::{ExpiryUnit, TokenExpiry};
pub use password::{hash_password, verify_against_dummy, verify_password, PasswordError};
pub use token::{Hs256TokenService, TokenError, TokenSigner, TokenVerifier};
