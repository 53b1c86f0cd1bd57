use std::collections::BTreeMap;

/// A 32-byte BLAKE3 hash used as a content fingerprint.
///
/// Files are fingerprinted by their byte stream, directories by the canonical
/// serialization of their children's `(name, hash)` pairs. The digest is only
/// required to be deterministic and collision resistant enough for change
/// detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    /// Hashes an in-memory buffer.
    pub fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    /// Hashes the contents of a file, streaming it from disk.
    ///
    /// This is blocking I/O, callers on an async runtime should run it on the
    /// blocking pool.
    pub fn hash_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        Ok(blake3::Hasher::new().update_mmap(path)?.finalize().into())
    }

    /// Hashes a keyed mapping of child names to child hashes.
    ///
    /// The mapping is serialized as a JSON object, so the keys take part in
    /// the digest and an empty mapping hashes differently from any non-empty
    /// one. `BTreeMap` keeps the keys sorted, which makes the result
    /// independent of the order the entries were discovered in.
    pub fn hash_mapping(children: &BTreeMap<String, String>) -> serde_json::Result<Self> {
        let json = serde_json::to_vec(children)?;
        Ok(Self::hash(json))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = String::with_capacity(64);

        for &byte in self.0.iter() {
            acc.push(HEX[(byte >> 4) as usize] as char);
            acc.push(HEX[(byte & 0xF) as usize] as char);
        }

        acc
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl std::fmt::Display for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x0f;

        let hex = Hash32::from(bytes).to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("ab00"));
        assert!(hex.ends_with("0f"));
    }

    #[test]
    fn test_hash_matches_blake3() {
        let expected = blake3::hash(b"hello");
        assert_eq!(Hash32::hash(b"hello").as_bytes(), expected.as_bytes());
        assert_eq!(Hash32::hash(b"hello").to_hex(), expected.to_hex().as_str());
    }

    #[test]
    fn test_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, b"some content").unwrap();

        assert_eq!(
            Hash32::hash_file(&path).unwrap(),
            Hash32::hash(b"some content")
        );
    }

    #[test]
    fn test_hash_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        assert_eq!(Hash32::hash_file(&path).unwrap(), Hash32::hash(b""));
    }

    #[test]
    fn test_mapping_encodes_keys() {
        let empty = BTreeMap::new();
        let mut single = BTreeMap::new();
        single.insert("a".to_string(), Hash32::hash(b"x").to_hex());
        let mut renamed = BTreeMap::new();
        renamed.insert("b".to_string(), Hash32::hash(b"x").to_hex());

        let empty = Hash32::hash_mapping(&empty).unwrap();
        let single = Hash32::hash_mapping(&single).unwrap();
        let renamed = Hash32::hash_mapping(&renamed).unwrap();

        assert_ne!(empty, single);
        assert_ne!(single, renamed);
    }

    #[test]
    fn test_mapping_insertion_order_irrelevant() {
        let mut forward = BTreeMap::new();
        let mut backward = BTreeMap::new();
        let names = ["c.txt", "a.txt", "b"];

        for name in names {
            forward.insert(name.to_string(), Hash32::hash(name).to_hex());
        }
        for name in names.iter().rev() {
            backward.insert(name.to_string(), Hash32::hash(name).to_hex());
        }

        assert_eq!(
            Hash32::hash_mapping(&forward).unwrap(),
            Hash32::hash_mapping(&backward).unwrap()
        );
    }
}
