use sha2::{Digest, Sha256};

/// Hash type used throughout the system: a 32-byte digest.
pub type Hash = [u8; 32];

/// `H(bytes) -> [u8; 32]`: SHA-256 over an arbitrary byte slice.
pub fn hash_bytes(input: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let res = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&res);
    out
}

/// `H(key ‖ value)` — the leaf hash.
pub fn hash_leaf(key: &[u8], value: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(value);
    let res = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&res);
    out
}

/// `H(concat over i of children[i].hash)` — the index-node hash.
pub fn hash_children(children: &[Hash; 16]) -> Hash {
    let mut hasher = Sha256::new();
    for child in children {
        hasher.update(child);
    }
    let res = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&res);
    out
}
