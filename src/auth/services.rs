use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::dto::{AuthResult, LoginRequest, RegisterRequest};
use super::jwt::TokenIssuer;
use super::password::decoy_hash;
use crate::error::{AppError, AppResult};
use crate::events::{EventPublisher, UserEvent, UserEventKind};
use crate::users::repo_types::Account;
use crate::users::services::AccountService;

/// Registration and login. Holds no session state between calls.
#[derive(Clone)]
pub struct AuthService {
    accounts: AccountService,
    tokens: Arc<dyn TokenIssuer>,
    events: Arc<dyn EventPublisher>,
}

impl AuthService {
    pub fn new(
        accounts: AccountService,
        tokens: Arc<dyn TokenIssuer>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            accounts,
            tokens,
            events,
        }
    }

    /// A publish failure fails the call; the created account stays.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> AppResult<AuthResult> {
        let account = self.accounts.create(&req).await?;

        self.events
            .publish(&UserEvent::new(UserEventKind::Registered, &account))
            .await?;

        let result = self.authenticated(account)?;
        info!(user_id = %result.user.id, "user registered");
        Ok(result)
    }

    /// Unknown email, wrong password and inactive account are indistinguishable.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthResult> {
        let Some(mut account) = self.accounts.find_by_email(&req.email).await? else {
            // keep the Argon2 cost on this path too
            let _ = self.accounts.validate_password(&req.password, decoy_hash());
            warn!("login unknown email");
            return Err(AppError::Unauthorized);
        };

        let valid = self
            .accounts
            .validate_password(&req.password, &account.password_hash)?;
        if !valid || !account.is_active {
            warn!(user_id = %account.id, "login rejected");
            return Err(AppError::Unauthorized);
        }

        self.accounts.record_login(&mut account).await?;

        self.events
            .publish(&UserEvent::new(UserEventKind::LoggedIn, &account))
            .await?;

        let result = self.authenticated(account)?;
        info!(user_id = %result.user.id, "user logged in");
        Ok(result)
    }

    fn authenticated(&self, account: Account) -> AppResult<AuthResult> {
        let token = self.tokens.issue(&account)?;
        Ok(AuthResult {
            user: account.into(),
            token,
        })
    }
}
