//! External file formats: the `.rp`/`.rp.ini` text program representation
//! and the `.lahc`/`.dlas` binary checkpoint layout, per spec.md §6.

pub mod checkpoint;
pub mod rp;

pub use checkpoint::{read_dlas, read_lahc, write_dlas, write_lahc};
pub use rp::{parse_rp, parse_rp_ini, write_rp, write_rp_ini, RpHeader};
