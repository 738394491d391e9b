use sha2::{Digest, Sha256};

/// Data covered by a request signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignPayload<'a> {
    /// Request timestamp, epoch milliseconds
    pub t: i64,
    /// Text of the latest outgoing message
    pub m: &'a str,
}

pub trait Signer: Send + Sync {
    fn sign(&self, payload: &SignPayload<'_>) -> String;
}

/// Hex SHA-256 over `"{t}:{m}:{secret}"`, the scheme the generation endpoint verifies
#[derive(Debug, Clone, Default)]
pub struct Sha256Signer {
    secret: String,
}

impl Sha256Signer {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret.unwrap_or_default().to_string(),
        }
    }
}

impl Signer for Sha256Signer {
    fn sign(&self, payload: &SignPayload<'_>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", payload.t, payload.m, self.secret));
        hex::encode(hasher.finalize())
    }
}
