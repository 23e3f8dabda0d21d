use std::path::PathBuf;
use std::sync::RwLock;

use scalyclaw_kv::KvStore;
use tracing::instrument;

use crate::crypto;
use crate::error::Result;
use crate::password;

/// Encrypted-secret store over the KV adapter (spec.md §3 "SecretEntry",
/// §4 "Vault"). Holds the derived AES key in memory behind a lock so
/// rotation can swap it out atomically for in-flight callers.
pub struct VaultManager {
    kv: KvStore,
    password_path: PathBuf,
    key: RwLock<[u8; 32]>,
}

impl VaultManager {
    pub fn new(kv: KvStore, password_path: PathBuf) -> Result<Self> {
        let password = password::load_or_create(&password_path)?;
        let key = crypto::derive_key(&password)?;
        Ok(Self {
            kv,
            password_path,
            key: RwLock::new(key),
        })
    }

    #[instrument(skip(self, value))]
    pub async fn set_secret(&self, name: &str, value: &str) -> Result<()> {
        let key = *self.key.read().expect("vault key lock poisoned");
        let envelope = crypto::encrypt(&key, value.as_bytes())?;
        self.kv.set(&scalyclaw_kv::keys::secret(name), &envelope).await?;
        self.track_name(name).await
    }

    #[instrument(skip(self))]
    pub async fn get_secret(&self, name: &str) -> Result<String> {
        let envelope = self
            .kv
            .get(&scalyclaw_kv::keys::secret(name))
            .await?
            .ok_or_else(|| crate::error::VaultError::NotFound(name.to_string()))?;

        let key = *self.key.read().expect("vault key lock poisoned");
        let plaintext = crypto::decrypt(&key, &envelope)?;
        Ok(String::from_utf8_lossy(&plaintext).to_string())
    }

    #[instrument(skip(self))]
    pub async fn delete_secret(&self, name: &str) -> Result<()> {
        self.kv.del(&scalyclaw_kv::keys::secret(name)).await?;
        self.kv.srem("scalyclaw:secret:index", name).await?;
        Ok(())
    }

    /// List the names of stored secrets. Names themselves are stored as an
    /// auxiliary set because plain Redis `KEYS`/`SCAN` over the secret
    /// namespace would work too, but an explicit index avoids a full
    /// keyspace scan in production deployments that share one Redis
    /// instance across ScalyClaw and other tools.
    pub async fn list_names(&self) -> Result<Vec<String>> {
        Ok(self.kv.smembers("scalyclaw:secret:index").await?)
    }

    async fn track_name(&self, name: &str) -> Result<()> {
        self.kv.sadd("scalyclaw:secret:index", name).await?;
        Ok(())
    }

    /// Rotate the vault password and re-encrypt every stored secret under
    /// the new key (spec.md §8 round-trip: "rotation preserves
    /// decrypt-ability of all stored secrets").
    #[instrument(skip(self))]
    pub async fn rotate(&self) -> Result<()> {
        let old_key = *self.key.read().expect("vault key lock poisoned");

        let names = self.list_names().await?;
        let mut plaintexts = Vec::with_capacity(names.len());
        for name in &names {
            let envelope = self
                .kv
                .get(&scalyclaw_kv::keys::secret(name))
                .await?
                .ok_or_else(|| crate::error::VaultError::NotFound(name.clone()))?;
            plaintexts.push(crypto::decrypt(&old_key, &envelope)?);
        }

        let new_password = password::rotate(&self.password_path)?;
        let new_key = crypto::derive_key(&new_password)?;

        for (name, plaintext) in names.iter().zip(plaintexts.iter()) {
            let envelope = crypto::encrypt(&new_key, plaintext)?;
            self.kv.set(&scalyclaw_kv::keys::secret(name), &envelope).await?;
        }

        *self.key.write().expect("vault key lock poisoned") = new_key;
        Ok(())
    }
}
