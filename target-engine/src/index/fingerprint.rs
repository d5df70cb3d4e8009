use sha2::{Digest, Sha256};
use shared::types::Entity;

/// Computes a SHA-256 fingerprint of the catalog.
/// Entities are visited in dataset order, since search output follows it.
pub fn compute_fingerprint(entities: &[Entity]) -> String {
    let mut hasher = Sha256::new();
    for entity in entities {
        hasher.update(entity.id.as_bytes());
        hasher.update([0]);
        hasher.update(entity.name.as_bytes());
        hasher.update([0]);
        hasher.update(entity.category.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(entity.region.as_bytes());
        hasher.update([0]);
        for prefix in &entity.address_prefixes {
            hasher.update(prefix.as_bytes());
            hasher.update([b',']);
        }
        hasher.update([b'\n']);
    }

    hex::encode(hasher.finalize())
}
