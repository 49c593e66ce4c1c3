//! Structural fingerprinting: a hash of a tree's static skeleton, with
//! no contribution from any dynamic value. Two renders of the same
//! template produce the same fingerprint exactly when every `"s"` array
//! at every depth (including each range item's) matches.

use std::fmt;

use super::tree::{Dynamic, Leaf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 16]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

pub fn fingerprint(leaf: &Leaf) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hash_leaf(leaf, &mut hasher);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    Fingerprint(bytes)
}

fn hash_leaf(leaf: &Leaf, hasher: &mut blake3::Hasher) {
    hasher.update(&(leaf.statics.len() as u32).to_le_bytes());
    for s in &leaf.statics {
        hasher.update(&(s.len() as u32).to_le_bytes());
        hasher.update(s.as_bytes());
    }
    hasher.update(&(leaf.dynamics.len() as u32).to_le_bytes());
    for dynamic in &leaf.dynamics {
        match dynamic {
            Dynamic::Str(_) => hasher.update(&[0u8]),
            Dynamic::Leaf(inner) => {
                hasher.update(&[1u8]);
                hash_leaf(inner, hasher);
            }
            Dynamic::List(items) => {
                hasher.update(&[2u8]);
                hasher.update(&(items.len() as u32).to_le_bytes());
                for item in items {
                    hash_leaf(item, hasher);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(statics: &[&str]) -> Leaf {
        Leaf {
            statics: statics.iter().map(|s| s.to_string()).collect(),
            dynamics: vec![Dynamic::Str("placeholder".to_string()); statics.len().saturating_sub(1)],
        }
    }

    #[test]
    fn same_skeleton_same_fingerprint_regardless_of_dynamic_values() {
        let a = Leaf {
            statics: vec!["<p>".to_string(), "</p>".to_string()],
            dynamics: vec![Dynamic::Str("Ada".to_string())],
        };
        let b = Leaf {
            statics: vec!["<p>".to_string(), "</p>".to_string()],
            dynamics: vec![Dynamic::Str("Grace".to_string())],
        };
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn different_skeleton_different_fingerprint() {
        let a = leaf(&["<p>", "</p>"]);
        let b = leaf(&["<div>", "</div>"]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
