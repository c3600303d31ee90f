//! On-disk snapshot formats. Only `.sna` is implemented (§6); the teacher's
//! `spectrusty-formats` crate covers several others, but this core only
//! needs the one this machine boots from.
pub mod sna;
