#![deny(missing_docs)]
//! Data model and wire message types for the threshold key-management core:
//! operator addressing, epochs, key-share versions and committees, and the
//! typed bodies exchanged between operators during DKG and reshare.

pub mod epoch;
pub mod messages;
pub mod node;
pub mod version;
