//! Keygen command implementation.

use super::emit;
use crate::OutputFormat;
use murmur_identity::KeyPair;
use serde::Serialize;

/// A freshly generated identity.
#[derive(Debug, Serialize)]
pub struct KeygenResult {
    /// Public key, hex.
    pub public_key: String,
    /// Secret key, hex. For the external backup flow only.
    pub secret_key: String,
}

/// Runs the keygen command.
pub fn run(format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let result = generate()?;
    eprintln!("Keep the secret key offline; anyone holding it can post as this identity.");
    emit(format, &result, |r| {
        println!("Public key: {}", r.public_key);
        println!("Secret key: {}", r.secret_key);
    })
}

fn generate() -> Result<KeygenResult, Box<dyn std::error::Error>> {
    let pair = KeyPair::generate()?;
    Ok(KeygenResult {
        public_key: pair.public_key().to_hex(),
        secret_key: pair.secret_hex().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_restores_public_key() {
        let result = generate().unwrap();
        let restored = KeyPair::from_secret_hex(&result.secret_key).unwrap();
        assert_eq!(restored.public_key().to_hex(), result.public_key);
    }
}
