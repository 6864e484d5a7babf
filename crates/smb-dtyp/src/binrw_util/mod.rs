//! Helpers for writing self-referential offset/length fields in SMB2 wire structures.

mod pos_marker;

pub use pos_marker::PosMarker;

pub mod prelude {
    pub use super::PosMarker;
}
