use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgArguments, query::QueryAs, PgPool, Postgres};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Account, AccountRow, NewAccount};
use super::search::{SearchQuery, SqlParam};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for account records.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn insert(&self, account: NewAccount) -> StoreResult<Account>;

    /// Write every profile column of `account`; `updated_at` is refreshed.
    async fn update(&self, account: &Account) -> StoreResult<Account>;

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()>;

    /// Matching accounts, ignoring pagination.
    async fn count(&self, query: &SearchQuery) -> StoreResult<i64>;

    async fn fetch_page(&self, query: &SearchQuery) -> StoreResult<Vec<Account>>;
}

const COLUMNS: &str = "id, email, first_name, last_name, password_hash, date_of_birth, gender, \
     city, country, bio, interests, skills, last_login_at, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn backend(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| StoreError::Backend(anyhow::Error::new(e).context(context))
}

fn bind_all<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    params: Vec<SqlParam>,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for p in params {
        query = match p {
            SqlParam::Bool(v) => query.bind(v),
            SqlParam::Text(v) => query.bind(v),
            SqlParam::Date(v) => query.bind(v),
            SqlParam::Timestamp(v) => query.bind(v),
            SqlParam::TextArray(v) => query.bind(v),
        };
    }
    query
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(backend("find account by email"))?;
        Ok(row.map(Account::try_from).transpose()?)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(backend("find account by id"))?;
        Ok(row.map(Account::try_from).transpose()?)
    }

    async fn insert(&self, account: NewAccount) -> StoreResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (email, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&account.email)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            _ => StoreError::Backend(anyhow::Error::new(e).context("insert account")),
        })?;
        Ok(Account::try_from(row)?)
    }

    async fn update(&self, account: &Account) -> StoreResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts
               SET first_name = $2, last_name = $3, date_of_birth = $4, gender = $5,
                   city = $6, country = $7, bio = $8, interests = $9, skills = $10,
                   is_active = $11, updated_at = now()
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(account.id)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.date_of_birth)
        .bind(account.gender.map(|g| g.as_str()))
        .bind(&account.city)
        .bind(&account.country)
        .bind(&account.bio)
        .bind(&account.interests)
        .bind(&account.skills)
        .bind(account.is_active)
        .fetch_one(&self.db)
        .await
        .map_err(backend("update account"))?;
        Ok(Account::try_from(row)?)
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE accounts SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await
            .map_err(backend("record login"))?;
        Ok(())
    }

    async fn count(&self, query: &SearchQuery) -> StoreResult<i64> {
        let (sql, params) = query.count_sql();
        let (total,) = bind_all(sqlx::query_as::<_, (i64,)>(&sql), params)
            .fetch_one(&self.db)
            .await
            .map_err(backend("count accounts"))?;
        Ok(total)
    }

    async fn fetch_page(&self, query: &SearchQuery) -> StoreResult<Vec<Account>> {
        let (sql, params) = query.page_sql(COLUMNS);
        let rows = bind_all(sqlx::query_as::<_, AccountRow>(&sql), params)
            .fetch_all(&self.db)
            .await
            .map_err(backend("search accounts"))?;
        rows.into_iter()
            .map(|r| Account::try_from(r).context("decode account row"))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }
}
