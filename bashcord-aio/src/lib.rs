// bashcord-aio/src/lib.rs
//! Filesystem, json and fingerprint primitives shared by the engine and the update pipeline.

pub mod checksum;
pub mod fs;
pub mod json_io;

pub use checksum::{
    fingerprint_bytes, fingerprint_dir, fingerprint_file, fingerprint_file_async, verify,
    verify_checksum, verify_checksum_async, Fingerprint,
};
pub use json_io::{read_json_sync, write_json_sync};
