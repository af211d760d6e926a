pub mod hash;

pub use hash::{hash_bytes, hash_children, hash_leaf, Hash};
