//! Password scrambling for the `mysql_native_password` and legacy
//! `mysql_old_password` authentication plugins.

use sha1::{Digest, Sha1};

/// `SHA1(password) XOR SHA1(cipher || SHA1(SHA1(password)))`, 20 bytes.
pub fn scramble_native(cipher: &[u8], password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let password_hash = sha1(password);
    let double_hash = sha1(&password_hash);
    let mut concat = Vec::with_capacity(cipher.len() + double_hash.len());
    concat.extend_from_slice(cipher);
    concat.extend_from_slice(&double_hash);
    xor(&password_hash, &sha1(&concat))
}

/// The legacy pre-4.1 scramble: an 8-byte hash mixing the cipher and the
/// password through two independent accumulators seeded from the password.
/// Ported from the classic `scramble323` algorithm (see
/// `go-sql-driver/mysql`'s `scrambleOldPassword`, which
/// `original_source/dump/packets.go` calls into).
pub fn scramble_old(cipher: &[u8], password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let (hash_lo, hash_hi) = hash_password_old(password);
    let (mut seed1, mut seed2) = hash_seed_old(&[hash_lo, hash_hi], cipher);

    let mut out = Vec::with_capacity(8);
    const SCRAMBLE_LENGTH: usize = 8;
    for _ in 0..SCRAMBLE_LENGTH {
        seed1 = (seed1.wrapping_mul(3).wrapping_add(seed2)) % 0x3FFFFFFF;
        seed2 = (seed1.wrapping_add(seed2).wrapping_add(33)) % 0x3FFFFFFF;
        let rand_val = seed1 as f64 / 0x3FFFFFFFu32 as f64;
        out.push((rand_val * 31.0) as u8 + 64);
    }

    let (mut seed1, mut seed2) = (seed1, seed2);
    seed1 = (seed1.wrapping_mul(3).wrapping_add(seed2)) % 0x3FFFFFFF;
    seed2 = (seed1.wrapping_add(seed2).wrapping_add(33)) % 0x3FFFFFFF;
    let rand_val = seed1 as f64 / 0x3FFFFFFFu32 as f64;
    let extra = (rand_val * 31.0) as u8;
    for b in out.iter_mut() {
        *b ^= extra;
    }

    out
}

fn hash_password_old(password: &[u8]) -> (u32, u32) {
    let (mut nr, mut nr2) = (1345345333u32, 0x12345671u32);
    let mut add = 7u32;
    for &b in password {
        if b == b' ' || b == b'\t' {
            continue;
        }
        let tmp = b as u32;
        nr ^= (((nr & 63).wrapping_add(add)).wrapping_mul(tmp)).wrapping_add(nr << 8);
        nr2 = nr2.wrapping_add((nr2 << 8) ^ nr);
        add = add.wrapping_add(tmp);
    }
    (nr & 0x7FFFFFFF, nr2 & 0x7FFFFFFF)
}

fn hash_seed_old(hash_pass: &[u32; 2], cipher: &[u8]) -> (u32, u32) {
    let (mut nr, mut nr2) = (1345345333u32, 0x12345671u32);
    let mut add = 7u32;
    for &b in cipher {
        let tmp = b as u32;
        nr ^= (((nr & 63).wrapping_add(add)).wrapping_mul(tmp)).wrapping_add(nr << 8);
        nr2 = nr2.wrapping_add((nr2 << 8) ^ nr);
        add = add.wrapping_add(tmp);
    }
    let seed1 = (nr & 0x7FFFFFFF) ^ hash_pass[0];
    let seed2 = (nr2 & 0x7FFFFFFF) ^ hash_pass[1];
    (seed1, seed2)
}

pub fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter()
        .enumerate()
        .map(|(i, byte)| byte ^ b[i % b.len()])
        .collect()
}

fn sha1(value: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(value);
    hasher.finalize().to_vec()
}
