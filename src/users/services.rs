use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::ProfileUpdate;
use super::repo::AccountStore;
use super::repo_types::{Account, NewAccount};
use super::search::{SearchCriteria, SearchQuery};
use crate::auth::dto::RegisterRequest;
use crate::auth::password::CredentialCodec;
use crate::error::{AppError, AppResult};
use crate::events::{EventPublisher, UserEvent};

/// One page of search results plus the unpaginated match count.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub accounts: Vec<Account>,
    pub total: i64,
}

/// Account lifecycle and lookup on top of an [`AccountStore`].
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    codec: Arc<dyn CredentialCodec>,
    events: Arc<dyn EventPublisher>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        codec: Arc<dyn CredentialCodec>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            codec,
            events,
        }
    }

    /// Returns the stored record, hash included.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn create(&self, req: &RegisterRequest) -> AppResult<Account> {
        if self.store.find_by_email(&req.email).await?.is_some() {
            warn!("email already registered");
            return Err(AppError::Conflict);
        }

        let password_hash = self.codec.hash(&req.password)?;

        // The unique index still guards the window between check and insert.
        let account = self
            .store
            .insert(NewAccount {
                email: req.email.clone(),
                first_name: req.first_name.clone(),
                last_name: req.last_name.clone(),
                password_hash,
            })
            .await?;

        info!(user_id = %account.id, "account created");
        Ok(account)
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        Ok(self.store.find_by_email(email).await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.store.find_by_id(id).await?)
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> AppResult<Account> {
        let mut account = self.store.find_by_id(id).await?.ok_or(AppError::NotFound)?;

        let updated_fields = update.changed_fields();
        update.apply_to(&mut account);
        let saved = self.store.update(&account).await?;

        self.events
            .publish(&UserEvent::profile_updated(&saved, updated_fields.clone()))
            .await?;

        info!(user_id = %saved.id, fields = ?updated_fields, "profile updated");
        Ok(saved)
    }

    pub fn validate_password(&self, plain: &str, hash: &str) -> AppResult<bool> {
        Ok(self.codec.verify(plain, hash)?)
    }

    /// Stamp `last_login_at` on `account` and persist it.
    pub async fn record_login(&self, account: &mut Account) -> AppResult<()> {
        let now = OffsetDateTime::now_utc();
        self.store.record_login(account.id, now).await?;
        account.last_login_at = Some(now);
        Ok(())
    }

    pub async fn search_users(&self, criteria: &SearchCriteria) -> AppResult<SearchResult> {
        self.search_users_at(criteria, OffsetDateTime::now_utc().date())
            .await
    }

    /// Search with an explicit "today" for the age window.
    #[instrument(skip(self, criteria))]
    pub async fn search_users_at(
        &self,
        criteria: &SearchCriteria,
        today: time::Date,
    ) -> AppResult<SearchResult> {
        let filters = serde_json::to_string(criteria).unwrap_or_default();
        info!(%filters, "executing search");

        let query = SearchQuery::build(criteria, today);
        let total = self.store.count(&query).await?;
        info!(total, "search matched");

        let accounts = self.store.fetch_page(&query).await?;
        info!(
            returned = accounts.len(),
            page = criteria.page,
            "search page loaded"
        );

        Ok(SearchResult { accounts, total })
    }
}
