//! Entry name hashing

/// Hash an entry name to its 32-bit lookup key.
///
/// The name is ASCII-upper-cased, then folded as `h = h*61 + c - 32`
/// with wrapping signed arithmetic. The empty name hashes to 0. The
/// hash is the sole lookup key inside a package: two names that
/// collide shadow each other, first declaration wins.
pub fn entry_name_hash(name: &str) -> i32 {
    let mut hash: i32 = 0;
    for c in name.to_ascii_uppercase().chars() {
        hash = hash.wrapping_mul(61).wrapping_add(c as i32).wrapping_sub(32);
    }
    hash
}
