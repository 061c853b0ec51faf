//! Wire-level helpers: turning captured frames into [`DecodedPacket`] views
//! and crafting probe frames with known fingerprints.
//!
//! [`DecodedPacket`]: badcapt_common::packet::DecodedPacket

pub mod craft;
pub mod decode;

pub use decode::{decode_ethernet, decode_ip};
