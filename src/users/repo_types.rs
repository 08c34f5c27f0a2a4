use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => anyhow::bail!("unknown gender {other:?}"),
        }
    }
}

/// Account record as the services see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never leaves the process
    #[serde(with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub gender: Option<Gender>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub skills: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields supplied at registration; everything else takes its default.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

impl NewAccount {
    /// Materialise the record the way the `accounts` column defaults would.
    pub fn into_account(self, now: OffsetDateTime) -> Account {
        Account {
            id: Uuid::new_v4(),
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            password_hash: self.password_hash,
            date_of_birth: None,
            gender: None,
            city: None,
            country: None,
            bio: None,
            interests: Vec::new(),
            skills: Vec::new(),
            last_login_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Row shape of the `accounts` table.
#[derive(Debug, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub skills: Vec<String>,
    pub last_login_at: Option<OffsetDateTime>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<AccountRow> for Account {
    type Error = anyhow::Error;

    fn try_from(r: AccountRow) -> Result<Self, Self::Error> {
        let gender = r.gender.as_deref().map(str::parse).transpose()?;
        Ok(Self {
            id: r.id,
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            password_hash: r.password_hash,
            date_of_birth: r.date_of_birth,
            gender,
            city: r.city,
            country: r.country,
            bio: r.bio,
            interests: r.interests,
            skills: r.skills,
            last_login_at: r.last_login_at,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Outward representation of an account. Has no password field at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub gender: Option<Gender>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub skills: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Account> for PublicAccount {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            email: a.email,
            first_name: a.first_name,
            last_name: a.last_name,
            date_of_birth: a.date_of_birth,
            gender: a.gender,
            city: a.city,
            country: a.country,
            bio: a.bio,
            interests: a.interests,
            skills: a.skills,
            last_login_at: a.last_login_at,
            is_active: a.is_active,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn sample() -> Account {
        let mut account = NewAccount {
            email: "test@example.com".into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
        }
        .into_account(datetime!(2024-01-02 03:04:05 UTC));
        account.date_of_birth = Some(date!(1990 - 01 - 01));
        account.gender = Some(Gender::Male);
        account
    }

    #[test]
    fn new_account_defaults() {
        let account = sample();
        assert!(account.is_active);
        assert!(account.last_login_at.is_none());
        assert!(account.interests.is_empty());
        assert_eq!(account.created_at, account.updated_at);
    }

    #[test]
    fn password_hash_never_serialized() {
        let account = sample();
        let raw = serde_json::to_value(&account).unwrap();
        assert!(raw.get("passwordHash").is_none());
        assert!(raw.get("password_hash").is_none());

        let public = serde_json::to_value(PublicAccount::from(account)).unwrap();
        assert!(public.get("passwordHash").is_none());
        assert_eq!(public["firstName"], "Test");
        assert_eq!(public["dateOfBirth"], "1990-01-01");
        assert_eq!(public["gender"], "male");
        assert_eq!(public["createdAt"], "2024-01-02T03:04:05Z");
        assert_eq!(public["isActive"], true);
    }

    #[test]
    fn row_with_unknown_gender_is_rejected() {
        let row = AccountRow {
            id: Uuid::new_v4(),
            email: "a@b.co".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            password_hash: "h".into(),
            date_of_birth: None,
            gender: Some("robot".into()),
            city: None,
            country: None,
            bio: None,
            interests: vec![],
            skills: vec![],
            last_login_at: None,
            is_active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert!(Account::try_from(row).is_err());
    }
}
