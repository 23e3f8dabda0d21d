//! The rotated file-backed vault password (spec.md §6 "Persisted state
//! layout": "a random 64-byte base64 secret at `~/scalyclaw.ps` (mode 0600),
//! rotated atomically by write-temp-then-rename").

use base64::Engine;
use rand::RngCore;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub fn default_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join("scalyclaw.ps")
}

/// Read the vault password, generating and persisting a fresh one on first
/// run.
pub fn load_or_create(path: &Path) -> Result<Vec<u8>> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(contents.trim())
            .map_err(|_| crate::error::VaultError::DecryptFailed)?;
        return Ok(decoded);
    }

    let secret = generate_secret();
    write_atomic(path, &secret)?;
    Ok(secret)
}

/// Generate a new password and atomically replace the one on disk
/// (write-temp-then-rename — no reader ever observes a half-written file).
/// The caller is responsible for re-encrypting all stored secrets under the
/// new key before/after calling this, per the rotation invariant.
pub fn rotate(path: &Path) -> Result<Vec<u8>> {
    let secret = generate_secret();
    write_atomic(path, &secret)?;
    Ok(secret)
}

fn generate_secret() -> Vec<u8> {
    let mut bytes = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.to_vec()
}

fn write_atomic(path: &Path, secret: &[u8]) -> Result<()> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(secret);

    let tmp_path = path.with_extension("ps.tmp");
    std::fs::write(&tmp_path, &encoded)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_or_create_is_stable_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalyclaw.ps");

        let a = load_or_create(&path).unwrap();
        let b = load_or_create(&path).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn rotate_changes_the_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalyclaw.ps");

        let original = load_or_create(&path).unwrap();
        let rotated = rotate(&path).unwrap();

        assert_ne!(original, rotated);
        assert_eq!(load_or_create(&path).unwrap(), rotated);
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalyclaw.ps");
        load_or_create(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
