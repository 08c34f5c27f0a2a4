use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Where account records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local, lost on restart. For local runs without a database.
    Memory,
}

impl StoreBackend {
    fn parse(raw: Option<&str>) -> anyhow::Result<Self> {
        match raw {
            None | Some("postgres") => Ok(StoreBackend::Postgres),
            Some("memory") => Ok(StoreBackend::Memory),
            Some(other) => anyhow::bail!("ACCOUNT_STORE must be postgres or memory, got {other:?}"),
        }
    }
}

/// Where user events go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventsBackend {
    /// Written to the log only.
    Log,
    Nats { url: String },
}

impl EventsBackend {
    fn parse(raw: Option<&str>, nats_url: Option<String>) -> anyhow::Result<Self> {
        match raw {
            None | Some("log") => Ok(EventsBackend::Log),
            Some("nats") => Ok(EventsBackend::Nats {
                url: nats_url.unwrap_or_else(|| "nats://localhost:4222".into()),
            }),
            Some(other) => anyhow::bail!("EVENTS_BACKEND must be log or nats, got {other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub topic: String,
    pub backend: EventsBackend,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub events: EventsConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = StoreBackend::parse(std::env::var("ACCOUNT_STORE").ok().as_deref())?;
        let database_url = match store {
            StoreBackend::Postgres => {
                std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?
            }
            StoreBackend::Memory => std::env::var("DATABASE_URL").unwrap_or_default(),
        };
        let database_max_connections = env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "accountd".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "accountd-users".into()),
            // one day
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60 * 24),
        };
        let events = EventsConfig {
            topic: std::env::var("EVENTS_TOPIC").unwrap_or_else(|_| "user-events".into()),
            backend: EventsBackend::parse(
                std::env::var("EVENTS_BACKEND").ok().as_deref(),
                std::env::var("NATS_URL").ok(),
            )?,
        };
        Ok(Self {
            store,
            database_url,
            database_max_connections,
            jwt,
            events,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_defaults_to_postgres() {
        assert_eq!(StoreBackend::parse(None).unwrap(), StoreBackend::Postgres);
        assert_eq!(
            StoreBackend::parse(Some("memory")).unwrap(),
            StoreBackend::Memory
        );
        assert!(StoreBackend::parse(Some("redis")).is_err());
    }

    #[test]
    fn events_backend_selection() {
        assert_eq!(EventsBackend::parse(None, None).unwrap(), EventsBackend::Log);
        assert_eq!(
            EventsBackend::parse(Some("nats"), None).unwrap(),
            EventsBackend::Nats {
                url: "nats://localhost:4222".into()
            }
        );
        assert_eq!(
            EventsBackend::parse(Some("nats"), Some("nats://broker:4222".into())).unwrap(),
            EventsBackend::Nats {
                url: "nats://broker:4222".into()
            }
        );
        assert!(EventsBackend::parse(Some("kafka"), None).is_err());
    }
}
