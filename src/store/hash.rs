//! Shard routing hash
//!
//! 32-bit FNV-1a. No per-process seed, so a key lands in the same shard on
//! every run with the same shard count.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over raw bytes
#[inline]
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Shard index for `key` among `shard_count` shards
#[inline]
pub fn route(key: &str, shard_count: usize) -> usize {
    debug_assert!(shard_count > 0);
    (fnv1a_32(key.as_bytes()) % shard_count as u32) as usize
}
