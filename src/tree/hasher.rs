//! Content hashing for file payloads

/// Compute the payload handle for a file's bytes.
///
/// The handle is the lowercase hex blake3 digest of the content, so it is
/// deterministic and doubles as an integrity check when the bytes are read back.
pub fn compute_payload_handle(content: &[u8]) -> String {
    hex::encode(blake3::hash(content).as_bytes())
}

/// Check that `content` still hashes to `handle`.
pub fn verify_payload(handle: &str, content: &[u8]) -> bool {
    compute_payload_handle(content) == handle
}
