use rand::{rngs::OsRng, RngCore};

/// Lowercase hex encoding of `n_bytes` bytes drawn from the OS CSPRNG.
pub fn random_hex(n_bytes: usize) -> String {
    let mut buf = vec![0u8; n_bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}
