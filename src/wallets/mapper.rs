use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::address::{generate_address, generate_wallet_id, normalize_address, validate_address};
use super::store::WalletStore;
use crate::error::ServiceError;
use crate::locks::KeyedLocks;
use crate::models::UserWalletMapping;

const MAX_CREATE_ATTEMPTS: usize = 3;

/// Primary address -> custodial sub-address, created once per address.
///
/// Creation is serialised per normalized address in-process, and the store's
/// primary key makes the first write win across processes sharing the file.
pub struct WalletMapper {
    store: WalletStore,
    locks: KeyedLocks,
}

impl WalletMapper {
    pub fn new(store: WalletStore) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn get_or_create(&self, user_address: &str) -> Result<UserWalletMapping, ServiceError> {
        validate_address(user_address)?;
        let key = normalize_address(user_address);
        let _guard = self.locks.lock(&key).await;

        if let Some(mut existing) = self.store.get(&key).await? {
            let now = Utc::now();
            self.store.touch(&key, now).await?;
            existing.last_used = now;
            debug!(user = %key, sub_wallet = %existing.sub_wallet_address, "sub-wallet found");
            return Ok(existing);
        }

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let now = Utc::now();
            let candidate = UserWalletMapping {
                user_address: key.clone(),
                sub_wallet_address: generate_address()?,
                sub_wallet_id: generate_wallet_id(),
                created_at: now,
                last_used: now,
            };

            if self.store.insert_if_absent(&candidate).await? {
                info!(
                    user = %key,
                    sub_wallet = %candidate.sub_wallet_address,
                    "created sub-wallet"
                );
                return Ok(candidate);
            }

            // Either another writer owns this address, or the generated
            // sub-address collided with an existing one.
            if let Some(winner) = self.store.get(&key).await? {
                debug!(user = %key, "sub-wallet created concurrently, using stored mapping");
                return Ok(winner);
            }
            warn!(user = %key, attempt, "sub-wallet address collision, regenerating");
        }

        Err(ServiceError::Storage(anyhow!(
            "could not create sub-wallet for {}",
            key
        )))
    }

    /// Existing mapping, without creating one.
    pub async fn lookup(&self, user_address: &str) -> Result<Option<UserWalletMapping>, ServiceError> {
        validate_address(user_address)?;
        Ok(self.store.get(&normalize_address(user_address)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallets::address::is_valid_address;
    use std::collections::HashSet;
    use std::sync::Arc;

    const USER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let mapper = WalletMapper::new(WalletStore::in_memory().unwrap());

        let first = mapper.get_or_create(USER).await.unwrap();
        let second = mapper.get_or_create(&USER.to_lowercase()).await.unwrap();

        assert_eq!(first.user_address, USER.to_lowercase());
        assert!(is_valid_address(&first.sub_wallet_address));
        assert_eq!(first.sub_wallet_address, second.sub_wallet_address);
        assert_eq!(first.sub_wallet_id, second.sub_wallet_id);
        assert_eq!(first.created_at, second.created_at);
        assert!(second.last_used >= first.last_used);
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let mapper = WalletMapper::new(WalletStore::in_memory().unwrap());
        let err = mapper.get_or_create("not-an-address").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAddress(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_calls_converge() {
        let mapper = Arc::new(WalletMapper::new(WalletStore::in_memory().unwrap()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let mapper = mapper.clone();
            handles.push(tokio::spawn(async move {
                mapper.get_or_create(USER).await.unwrap().sub_wallet_address
            }));
        }

        let mut seen = HashSet::new();
        for h in handles {
            seen.insert(h.await.unwrap());
        }
        assert_eq!(seen.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_separate_mappers_on_one_store_converge() {
        // No shared lock: only the storage constraint keeps them consistent.
        let store = WalletStore::in_memory().unwrap();
        let a = Arc::new(WalletMapper::new(store.clone()));
        let b = Arc::new(WalletMapper::new(store.clone()));

        let (ra, rb) = tokio::join!(
            {
                let a = a.clone();
                tokio::spawn(async move { a.get_or_create(USER).await.unwrap() })
            },
            {
                let b = b.clone();
                tokio::spawn(async move { b.get_or_create(USER).await.unwrap() })
            }
        );

        assert_eq!(
            ra.unwrap().sub_wallet_address,
            rb.unwrap().sub_wallet_address
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lookup_does_not_create() {
        let mapper = WalletMapper::new(WalletStore::in_memory().unwrap());
        assert!(mapper.lookup(USER).await.unwrap().is_none());
        mapper.get_or_create(USER).await.unwrap();
        assert!(mapper.lookup(USER).await.unwrap().is_some());
    }
}
