//! Security Module
//!
//! Handling of sensitive in-memory data: seed buffers that zeroize on
//! drop and never print their contents.

pub mod keying_material;

pub use keying_material::*;
