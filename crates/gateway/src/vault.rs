use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use toolgate_common::error::ErrorKind;
use toolgate_common::ids::TenantId;
use toolgate_common::types::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const ENVELOPE_VERSION: u8 = 1;

/// Credential Vault. Holds one master key and derives a
/// per-tenant AES-256-GCM key from it via HMAC-SHA256, so a key
/// compromise in one tenant's envelope never helps decrypt another's.
/// Plaintext only ever exists inside `encrypt`/`decrypt`'s stack frame.
pub struct CredentialVault {
    master_key: Vec<u8>,
}

/// Wraps decrypted credential material so it is never accidentally
/// logged — `Debug` delegates to `AuthConfig`'s own redacting impl.
pub struct DecryptedCredential(pub AuthConfig);

impl std::fmt::Debug for DecryptedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("credentials could not be encrypted")]
    EncryptFailed,
    #[error("credentials could not be decrypted")]
    DecryptFailed,
    #[error("unsupported credential envelope version: {0}")]
    UnsupportedVersion(u8),
    #[error("malformed credential envelope")]
    Malformed,
    #[error("vault master key is missing or invalid")]
    KeyUnavailable,
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EncryptFailed | Self::DecryptFailed | Self::Malformed => {
                ErrorKind::CredentialsInvalid
            }
            Self::UnsupportedVersion(_) | Self::KeyUnavailable => ErrorKind::VaultUnavailable,
        }
    }
}

impl CredentialVault {
    /// Load the master key from the environment variable named by
    /// `system.vault.master_key_env` (base64-encoded, 32 bytes).
    pub fn from_env(master_key_env: &str) -> Result<Self, VaultError> {
        let encoded = std::env::var(master_key_env).map_err(|_| VaultError::KeyUnavailable)?;
        let master_key = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| VaultError::KeyUnavailable)?;
        if master_key.len() < 32 {
            return Err(VaultError::KeyUnavailable);
        }
        Ok(Self { master_key })
    }

    fn derive_tenant_key(&self, tenant_id: TenantId) -> Result<Key<Aes256Gcm>, VaultError> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.master_key).map_err(|_| VaultError::KeyUnavailable)?;
        mac.update(tenant_id.to_string().as_bytes());
        let digest = mac.finalize().into_bytes();
        Ok(*Key::<Aes256Gcm>::from_slice(&digest))
    }

    /// `encrypt(tenant_id, plaintext) → ciphertext`.
    pub fn encrypt(
        &self,
        tenant_id: TenantId,
        credential: &AuthConfig,
    ) -> Result<Vec<u8>, VaultError> {
        let key = self.derive_tenant_key(tenant_id)?;
        let cipher = Aes256Gcm::new(&key);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = serde_json::to_vec(credential).map_err(|_| VaultError::EncryptFailed)?;
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| VaultError::EncryptFailed)?;

        let mut envelope = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        envelope.push(ENVELOPE_VERSION);
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    /// `decrypt(tenant_id, ciphertext) → plaintext`, scoped to the
    /// caller's frame — callers must not persist the
    /// returned value past the call that needed it.
    pub fn decrypt(
        &self,
        tenant_id: TenantId,
        envelope: &[u8],
    ) -> Result<DecryptedCredential, VaultError> {
        if envelope.len() < 1 + NONCE_LEN {
            return Err(VaultError::Malformed);
        }
        let version = envelope[0];
        if version != ENVELOPE_VERSION {
            return Err(VaultError::UnsupportedVersion(version));
        }

        let nonce = Nonce::from_slice(&envelope[1..1 + NONCE_LEN]);
        let ciphertext = &envelope[1 + NONCE_LEN..];

        let key = self.derive_tenant_key(tenant_id)?;
        let cipher = Aes256Gcm::new(&key);
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::DecryptFailed)?;

        let credential: AuthConfig =
            serde_json::from_slice(&plaintext).map_err(|_| VaultError::DecryptFailed)?;
        Ok(DecryptedCredential(credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_common::ids::TenantId;

    fn vault() -> CredentialVault {
        CredentialVault {
            master_key: vec![7u8; 32],
        }
    }

    #[test]
    fn round_trips_bearer_credential() {
        let vault = vault();
        let tenant = TenantId::new();
        let cred = AuthConfig::Bearer {
            token: "super-secret".to_string(),
        };

        let envelope = vault.encrypt(tenant, &cred).unwrap();
        let decrypted = vault.decrypt(tenant, &envelope).unwrap();
        match decrypted.0 {
            AuthConfig::Bearer { token } => assert_eq!(token, "super-secret"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rejects_envelope_decrypted_under_wrong_tenant() {
        let vault = vault();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let cred = AuthConfig::Bearer {
            token: "super-secret".to_string(),
        };

        let envelope = vault.encrypt(tenant_a, &cred).unwrap();
        assert!(vault.decrypt(tenant_b, &envelope).is_err());
    }

    #[test]
    fn rejects_unsupported_version_byte() {
        let vault = vault();
        let tenant = TenantId::new();
        let mut envelope = vault
            .encrypt(
                tenant,
                &AuthConfig::Bearer {
                    token: "x".to_string(),
                },
            )
            .unwrap();
        envelope[0] = 9;
        match vault.decrypt(tenant, &envelope) {
            Err(VaultError::UnsupportedVersion(9)) => {}
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn debug_impl_never_prints_plaintext() {
        let decrypted = DecryptedCredential(AuthConfig::Bearer {
            token: "super-secret".to_string(),
        });
        let rendered = format!("{decrypted:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
