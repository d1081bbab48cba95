use sha2::{Digest, Sha256};

/// Derives the Contentful asset id for an Alchemy picture file uid.
///
/// The id is the lowercase hex SHA-256 digest of the uid bytes. It is
/// client-chosen rather than remote-assigned: every run derives the
/// same remote identifier for the same source file.
pub fn derive_asset_id(uid: &str) -> String {
    assert!(!uid.is_empty(), "picture uid must not be empty");

    let mut hasher = Sha256::new();
    hasher.update(uid.as_bytes());
    format!("{:x}", hasher.finalize())
}
