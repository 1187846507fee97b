#![deny(missing_docs)]
//! Pairing primitives, Feldman polynomials and the threshold Boneh-Franklin
//! identity-based encryption scheme underlying the key-management core.
//!
//! This crate has no async runtime dependency: it is pure, deterministic
//! cryptography operating over BLS12-381. Callers (the DKG/reshare state
//! machines, the application service surface) live in `tkms-node`.

pub mod ark_serde;
pub mod curve;
pub mod ibe;
pub mod poly;
pub mod share_enc;
