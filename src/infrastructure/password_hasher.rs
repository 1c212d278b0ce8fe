// Peppered HMAC-SHA256 password hashing
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 32;

/// Hashes `password:salt` with an HMAC keyed by the process-wide pepper.
///
/// The pepper is handed in by the caller; this type never looks at the
/// environment.
#[derive(Clone)]
pub struct PasswordHasher {
    keyed: HmacSha256,
}

impl PasswordHasher {
    pub fn new(pepper: &str) -> Result<Self, InvalidLength> {
        Ok(Self {
            keyed: HmacSha256::new_from_slice(pepper.as_bytes())?,
        })
    }

    /// 32 random bytes, base64 encoded.
    pub fn generate_salt(&self) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        STANDARD.encode(salt)
    }

    pub fn hash_password(&self, password: &str, salt: &str) -> String {
        STANDARD.encode(self.digest(password, salt))
    }

    /// Constant-time comparison of the recomputed digest with `stored_hash`.
    /// A stored value that is not valid base64 is compared as a plain string.
    pub fn verify_password(&self, password: &str, salt: &str, stored_hash: &str) -> bool {
        let computed = self.digest(password, salt);
        match STANDARD.decode(stored_hash) {
            Ok(stored) => computed.as_slice().ct_eq(stored.as_slice()).into(),
            Err(_) => STANDARD.encode(computed) == stored_hash,
        }
    }

    fn digest(&self, password: &str, salt: &str) -> Vec<u8> {
        let mut mac = self.keyed.clone();
        mac.update(password.as_bytes());
        mac.update(b":");
        mac.update(salt.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}
