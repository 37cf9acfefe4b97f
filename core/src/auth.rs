use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a token string.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short, non-reversible identifier for a token, safe to log.
/// Format: `sha256:` + first 12 hex chars of the digest.
pub fn token_fingerprint(token: &str) -> String {
    let digest = hash_token(token);
    format!("sha256:{}", &digest[..12])
}

/// Replace every occurrence of `token` in `text` with a redaction marker.
/// Provider error messages occasionally echo request headers back.
pub fn redact_token(text: &str, token: &str) -> String {
    if token.is_empty() {
        return text.to_string();
    }
    text.replace(token, "[REDACTED]")
}
