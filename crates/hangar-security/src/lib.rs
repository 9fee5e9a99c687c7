mod checksum;

pub use checksum::{digest_for_file_name, sha256_hex_file, verify_sha256_file};
