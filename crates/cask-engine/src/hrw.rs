//! Rendezvous (highest-random-weight) hashing for write routing.
//!
//! Every shard gets a weight for a given address key; ranking shards by
//! weight yields a deterministic, coordination-free, load-balanced
//! assignment that any node can recompute locally. Removing a shard from
//! the candidate set only reassigns the addresses that ranked it first.

use cask_types::ShardId;

/// Weight of one shard for one address key.
///
/// The first eight bytes of `BLAKE3(key ‖ shard-id)`, so the ranking is a
/// pure function of the pair. The hash's total order over shard ids breaks
/// ties.
pub fn weight(key: &[u8], shard: &ShardId) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(key);
    hasher.update(shard.as_bytes());
    let hash = hasher.finalize();
    u64::from_le_bytes(hash.as_bytes()[..8].try_into().expect("8-byte slice"))
}

/// Sort shard ids by descending weight for the key, ties by id order.
pub fn rank(key: &[u8], shards: &mut [ShardId]) {
    shards.sort_by(|a, b| {
        weight(key, b)
            .cmp(&weight(key, a))
            .then_with(|| a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_is_deterministic() {
        let shard = ShardId::generate();
        assert_eq!(weight(b"key", &shard), weight(b"key", &shard));
    }

    #[test]
    fn weights_differ_across_shards() {
        let a = ShardId::generate();
        let b = ShardId::generate();
        assert_ne!(weight(b"key", &a), weight(b"key", &b));
    }

    #[test]
    fn rank_is_stable_under_permutation() {
        let shards: Vec<ShardId> = (0..5).map(|_| ShardId::generate()).collect();

        let mut forward = shards.clone();
        rank(b"some-address", &mut forward);

        let mut reversed: Vec<ShardId> = shards.iter().rev().copied().collect();
        rank(b"some-address", &mut reversed);

        assert_eq!(forward, reversed);
    }

    #[test]
    fn removing_a_shard_keeps_relative_order() {
        let mut shards: Vec<ShardId> = (0..4).map(|_| ShardId::generate()).collect();
        rank(b"address", &mut shards);

        let removed = shards[1];
        let mut remaining: Vec<ShardId> =
            shards.iter().copied().filter(|s| *s != removed).collect();
        let expected = remaining.clone();
        rank(b"address", &mut remaining);

        assert_eq!(remaining, expected);
    }

    #[test]
    fn different_keys_produce_different_rankings() {
        let shards: Vec<ShardId> = (0..8).map(|_| ShardId::generate()).collect();

        let mut by_a = shards.clone();
        rank(b"address-a", &mut by_a);
        let mut by_b = shards.clone();
        rank(b"address-b", &mut by_b);

        // Not guaranteed for any fixed pair of keys, but with 8 shards the
        // chance of identical rankings is 1/8! — treat a collision as a bug.
        assert_ne!(by_a, by_b);
    }
}
