//! Core types for PayStream.

mod address;
mod announcement;
mod discovery;
mod keys;
mod transfer;

pub use address::*;
pub use announcement::*;
pub use discovery::*;
pub use keys::*;
pub use transfer::*;
