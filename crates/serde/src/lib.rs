//! Serialization helpers shared by the Wayfarer crates.
mod hex;

pub use self::hex::{decode_prefixed, decode_prefixed_array, encode_prefixed, HexBytes, HexError};
