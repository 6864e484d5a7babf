//! Common data types shared between the wire-format and connection-engine crates.

pub mod binrw_util;
mod guid;

pub use guid::Guid;
