use crate::token::random_hex;

/// Random bytes behind a regular short code (6 hex chars).
pub const SHORT_CODE_BYTES: usize = 3;
/// Random bytes behind the fallback code used after repeated collisions (12 hex chars).
pub const LONG_SHORT_CODE_BYTES: usize = 6;

/// Six lowercase hex characters from the OS CSPRNG. Uniqueness is checked by the caller.
pub fn generate_short_code() -> String {
    random_hex(SHORT_CODE_BYTES)
}

pub fn generate_long_short_code() -> String {
    random_hex(LONG_SHORT_CODE_BYTES)
}
