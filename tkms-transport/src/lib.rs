#![deny(missing_docs)]
//! Authenticated envelope construction and verification for inter-operator
//! messaging, plus the long-term signing and peering ports it sits on.
//!
//! This crate has no opinion on how bytes actually reach another operator:
//! `tkms-node` wires a concrete [`peer::PeerTransport`] (TCP, QUIC, or an
//! in-memory fixture for tests) and drives [`envelope::Envelope`] atop it.

pub mod envelope;
pub mod peer;
pub mod signer;
