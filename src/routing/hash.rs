const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// MurmurHash3, x86 32-bit variant.
pub fn murmur3_x86_32(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();

    for chunk in chunks {
        let k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h1 ^= scramble(k1);
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    if !tail.is_empty() {
        let mut k1 = 0u32;
        for (i, byte) in tail.iter().enumerate() {
            k1 ^= (*byte as u32) << (8 * i);
        }
        h1 ^= scramble(k1);
    }

    h1 ^= data.len() as u32;
    fmix32(h1)
}

fn scramble(k1: u32) -> u32 {
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Routing hash of a document identifier.
///
/// Composite identifiers (`shardKey!docId`) keep the top 16 bits from the
/// shard-key hash and the low 16 bits from the rest, so every document that
/// shares a shard key lands in the same narrow slice of the ring.
pub fn route_hash(id: &str) -> i32 {
    match id.split_once('!') {
        Some((shard_key, rest)) if !shard_key.is_empty() => {
            let upper = murmur3_x86_32(shard_key.as_bytes(), 0) & 0xffff_0000;
            let lower = murmur3_x86_32(rest.as_bytes(), 0) & 0x0000_ffff;
            (upper | lower) as i32
        }
        _ => murmur3_x86_32(id.as_bytes(), 0) as i32,
    }
}
