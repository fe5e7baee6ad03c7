//! Wire format between an eval and a module: one JSON object per line.

pub mod message;
pub mod transport;

pub use message::*;
