//! PIN credential storage using AES-256-GCM
//!
//! The 6-digit PIN never touches disk in plaintext. It is sealed with
//! AES-256-GCM under a statically derived key and stored base64-encoded
//! in the credential file, which is written with user-only permissions.
//! The file is read-only at runtime; only the explicit setup flow writes
//! it.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::constants::{CREDENTIAL_FILE_PERMISSIONS, PIN_LENGTH};

/// Static seed for key derivation (consistent across all builds/versions)
///
/// Keeps credential files portable across versions of the application.
const KEY_SEED: &str = "io.fieldscan.recon.credential.v1";

const NONCE_LENGTH_BYTES: usize = 12;

/// Derive the 32-byte AES-256 key from the static seed.
fn derive_key() -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(KEY_SEED.as_bytes());
    hasher.finalize().into()
}

/// Check that a candidate PIN is exactly PIN_LENGTH ASCII digits.
pub fn validate_pin(pin: &str) -> Result<[u8; PIN_LENGTH]> {
    let bytes = pin.as_bytes();
    if bytes.len() != PIN_LENGTH {
        anyhow::bail!("PIN must be exactly {} digits", PIN_LENGTH);
    }
    if !bytes.iter().all(|b| b.is_ascii_digit()) {
        anyhow::bail!("PIN must contain only digits 0-9");
    }
    let mut pin_code = [0u8; PIN_LENGTH];
    pin_code.copy_from_slice(bytes);
    Ok(pin_code)
}

/// Seal a PIN for storage.
///
/// Returns a base64 string containing: nonce (12 bytes) || ciphertext
/// (which includes the GCM auth tag).
pub fn seal_pin(pin: &[u8; PIN_LENGTH]) -> Result<String> {
    let key = derive_key();
    let cipher = Aes256Gcm::new(&key.into());

    let mut nonce_bytes = [0u8; NONCE_LENGTH_BYTES];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| anyhow::anyhow!("Failed to generate random nonce: {:?}", e))?;
    let nonce = &nonce_bytes.into();

    let ciphertext = cipher
        .encrypt(nonce, pin.as_slice())
        .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

    let mut blob = Vec::with_capacity(NONCE_LENGTH_BYTES + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&blob))
}

/// Unseal a stored PIN blob.
///
/// # Errors
///
/// Fails on bad base64, a truncated blob, failed authentication (tampered
/// or corrupted data), or a payload that is not a valid PIN.
pub fn unseal_pin(sealed: &str) -> Result<[u8; PIN_LENGTH]> {
    let data = BASE64
        .decode(sealed.trim())
        .context("Failed to decode base64")?;

    if data.len() < NONCE_LENGTH_BYTES {
        anyhow::bail!("Invalid credential data: too short");
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LENGTH_BYTES);
    let nonce_array: [u8; NONCE_LENGTH_BYTES] =
        nonce_bytes.try_into().context("Invalid nonce length")?;
    let nonce = &nonce_array.into();

    let key = derive_key();
    let cipher = Aes256Gcm::new(&key.into());
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))?;

    let pin = std::str::from_utf8(&plaintext).context("Invalid UTF-8 in credential")?;
    validate_pin(pin)
}

/// Write the sealed PIN to the credential file with 0600 permissions.
pub fn store_pin(path: &Path, pin: &[u8; PIN_LENGTH]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create credential directory")?;
    }

    let sealed = seal_pin(pin)?;
    fs::write(path, sealed)
        .with_context(|| format!("Failed to write credential file: {}", path.display()))?;

    #[cfg(unix)]
    {
        let mut permissions = fs::metadata(path)?.permissions();
        permissions.set_mode(CREDENTIAL_FILE_PERMISSIONS);
        fs::set_permissions(path, permissions)
            .context("Failed to set credential file permissions")?;
    }

    log::info!("Credential stored at: {}", path.display());
    Ok(())
}

/// Read and unseal the PIN from the credential file.
pub fn load_pin(path: &Path) -> Result<[u8; PIN_LENGTH]> {
    let sealed = fs::read_to_string(path)
        .with_context(|| format!("Failed to read credential file: {}", path.display()))?;
    unseal_pin(&sealed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_credential_path() -> PathBuf {
        use std::thread;
        use std::time::{SystemTime, UNIX_EPOCH};

        let mut base = std::env::temp_dir();
        base.push("fieldscan_tests");
        base.push("credential");

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tid = format!("{:?}", thread::current().id());
        base.push(format!("t_{nanos}_{tid}"));

        let _ = fs::create_dir_all(&base);
        base.join("credential.bin")
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let pin = *b"123456";
        let sealed = seal_pin(&pin).expect("Sealing failed");
        let unsealed = unseal_pin(&sealed).expect("Unsealing failed");
        assert_eq!(pin, unsealed);
    }

    #[test]
    fn test_different_nonces() {
        let pin = *b"000000";
        let sealed1 = seal_pin(&pin).expect("Seal 1 failed");
        let sealed2 = seal_pin(&pin).expect("Seal 2 failed");

        // Same PIN, different blobs (random nonces)
        assert_ne!(sealed1, sealed2);
        assert_eq!(unseal_pin(&sealed1).unwrap(), pin);
        assert_eq!(unseal_pin(&sealed2).unwrap(), pin);
    }

    #[test]
    fn test_tampered_blob_rejected() {
        let sealed = seal_pin(b"654321").expect("Sealing failed");
        let mut bytes = BASE64.decode(&sealed).unwrap();
        bytes[NONCE_LENGTH_BYTES] ^= 0x01;
        let tampered = BASE64.encode(&bytes);

        assert!(
            unseal_pin(&tampered).is_err(),
            "Tampered data must fail authentication"
        );
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(unseal_pin("not-valid-base64!!!").is_err());
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let short = BASE64.encode([1u8, 2, 3, 4, 5]);
        assert!(unseal_pin(&short).is_err());
    }

    #[test]
    fn test_validate_pin_rules() {
        assert!(validate_pin("123456").is_ok());
        assert!(validate_pin("12345").is_err(), "Too short");
        assert!(validate_pin("1234567").is_err(), "Too long");
        assert!(validate_pin("12345a").is_err(), "Non-digit");
        assert!(validate_pin("12 456").is_err(), "Whitespace");
    }

    #[test]
    fn test_store_load_roundtrip() {
        let path = temp_credential_path();
        let pin = *b"908172";

        store_pin(&path, &pin).expect("Store failed");
        let loaded = load_pin(&path).expect("Load failed");
        assert_eq!(pin, loaded);

        #[cfg(unix)]
        {
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "Credential file must be 0600");
        }

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = temp_credential_path();
        let _ = fs::remove_file(&path);
        assert!(load_pin(&path).is_err());
    }
}
