use crate::error::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize a value to canonical artifact JSON: sorted keys, two-space
/// indent, UTF-8, trailing LF.
///
/// Every persisted artifact goes through this function so byte-identical
/// inputs produce byte-identical blobs — shard content hashes depend on it.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    // Round-tripping through `Value` sorts object keys: serde_json's map
    // is a BTreeMap unless the preserve_order feature is enabled.
    let value = serde_json::to_value(value)?;
    let mut out = serde_json::to_string_pretty(&value)?;
    out.push('\n');
    Ok(out)
}

/// Full lowercase hex SHA-256 of a byte string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Truncated hash used for repo-derived blob names (memory, embeddings).
pub fn sha256_hex_short(input: &str) -> String {
    sha256_hex(input.as_bytes())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        zebra: u32,
        alpha: &'static str,
    }

    #[test]
    fn keys_are_sorted() {
        let json = to_canonical_json(&Sample { zebra: 1, alpha: "x" }).unwrap();
        let alpha_pos = json.find("alpha").unwrap();
        let zebra_pos = json.find("zebra").unwrap();
        assert!(alpha_pos < zebra_pos);
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn identical_values_hash_identically() {
        let a = to_canonical_json(&Sample { zebra: 7, alpha: "y" }).unwrap();
        let b = to_canonical_json(&Sample { zebra: 7, alpha: "y" }).unwrap();
        assert_eq!(sha256_hex(a.as_bytes()), sha256_hex(b.as_bytes()));
        assert_eq!(sha256_hex(a.as_bytes()).len(), 64);
    }
}
