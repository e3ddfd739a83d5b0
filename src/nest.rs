mod client;
mod device;
mod error;
mod nullable;
mod structure;

pub use client::*;
pub use device::*;
pub use error::*;
pub use structure::*;
