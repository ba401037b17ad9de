use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{debug, error};

const MIN_LEN: usize = 6;
const MAX_LEN: usize = 128;

/// Salted Argon2id hash in PHC string format.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let len = plain.chars().count();
    anyhow::ensure!(
        (MIN_LEN..=MAX_LEN).contains(&len),
        "password must be between {MIN_LEN} and {MAX_LEN} characters"
    );
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Never errors: empty input or an unparsable hash is simply a mismatch.
pub fn compare_password(plain: &str, hash: &str) -> bool {
    if plain.is_empty() || hash.is_empty() {
        return false;
    }
    let parsed = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "stored hash is not a PHC string");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_compare_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(compare_password(password, &hash));
    }

    #[test]
    fn compare_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!compare_password("wrong-password", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("Password123").unwrap();
        let b = hash_password("Password123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn compare_is_false_on_malformed_input() {
        assert!(!compare_password("anything", "not-a-valid-hash"));
        assert!(!compare_password("", "whatever"));
        assert!(!compare_password("anything", ""));
    }

    #[test]
    fn hash_rejects_out_of_range_lengths() {
        assert!(hash_password("12345").is_err());
        assert!(hash_password(&"x".repeat(129)).is_err());
    }
}
