use sha1::{Digest, Sha1};

/// Hex SHA-1 digest of the raw password bytes, the format stored in `users.password_hash`.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha1::digest(password.as_bytes()))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    hash_password(password).eq_ignore_ascii_case(password_hash)
}
