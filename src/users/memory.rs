use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::{AccountStore, StoreError, StoreResult};
use super::repo_types::{Account, NewAccount};
use super::search::SearchQuery;

/// Process-local store. Keeps insertion order so unsorted ties behave like a
/// heap scan. Strings sort byte-wise, which only approximates the order a
/// PostgreSQL locale collation gives.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<Vec<Account>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully formed record, bypassing registration.
    #[cfg(test)]
    pub async fn put(&self, account: Account) {
        self.accounts.write().await.push(account);
    }

    async fn filtered(&self, query: &SearchQuery) -> Vec<Account> {
        self.accounts
            .read()
            .await
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn insert(&self, account: NewAccount) -> StoreResult<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts.iter().any(|a| a.email == account.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let account = account.into_account(OffsetDateTime::now_utc());
        accounts.push(account.clone());
        tracing::debug!(user_id = %account.id, "account inserted");
        Ok(account)
    }

    async fn update(&self, account: &Account) -> StoreResult<Account> {
        let mut accounts = self.accounts.write().await;
        let stored = accounts
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| anyhow::anyhow!("account {} vanished during update", account.id))?;
        *stored = Account {
            updated_at: OffsetDateTime::now_utc(),
            ..account.clone()
        };
        Ok(stored.clone())
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        let mut accounts = self.accounts.write().await;
        if let Some(a) = accounts.iter_mut().find(|a| a.id == id) {
            a.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn count(&self, query: &SearchQuery) -> StoreResult<i64> {
        Ok(self.filtered(query).await.len() as i64)
    }

    async fn fetch_page(&self, query: &SearchQuery) -> StoreResult<Vec<Account>> {
        let mut matching = self.filtered(query).await;
        // stable: ties keep insertion order
        matching.sort_by(|a, b| query.compare(a, b));
        Ok(matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect())
    }
}
