use crate::error::{BuildError, Result};
use russh_keys::PublicKeyBase64;
use russh_keys::key::KeyPair;

/// Temporary key pair used to reach the build server
#[derive(Clone)]
pub struct GeneratedKey {
    /// PEM-encoded private key
    pub private_pem: String,
    /// `authorized_keys` line
    pub public_openssh: String,
}

impl std::fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("public_openssh", &self.public_openssh)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh Ed25519 key pair
pub fn generate_key(comment: &str) -> Result<GeneratedKey> {
    let key: Option<KeyPair> = KeyPair::generate_ed25519().into();
    let key = key.ok_or_else(|| BuildError::KeyGeneration("no key produced".to_string()))?;

    let mut pem = Vec::new();
    russh_keys::encode_pkcs8_pem(&key, &mut pem)
        .map_err(|e| BuildError::KeyGeneration(e.to_string()))?;
    let private_pem =
        String::from_utf8(pem).map_err(|e| BuildError::KeyGeneration(e.to_string()))?;

    let public_openssh = format!("{} {} {}", key.name(), key.public_key_base64(), comment)
        .trim_end()
        .to_string();

    Ok(GeneratedKey {
        private_pem,
        public_openssh,
    })
}
