use crate::error::ConfigError;

pub const MIN_SECRET_LENGTH: usize = 32;
pub const MIN_HASH_COST: u32 = 10;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
///
/// Access and refresh tokens are signed with distinct secrets; validation
/// refuses a configuration where they match or either is shorter than 32
/// bytes.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry: i64,  // seconds, default 3600 (1 hour)
    pub refresh_token_expiry: i64, // seconds, default 2592000 (30 days)
    pub issuer: String,
    pub audience: Vec<String>,
}

#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    pub hash_cost: u32,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.access_token_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.access_token_secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.jwt.refresh_token_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.refresh_token_secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.jwt.access_token_secret == self.jwt.refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "jwt access and refresh secrets must differ".to_string(),
            ));
        }
        if self.jwt.issuer.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.issuer".to_string()));
        }
        if self.jwt.audience.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.audience".to_string()));
        }
        if self.jwt.access_token_expiry <= 0 || self.jwt.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt token expiries must be positive".to_string(),
            ));
        }
        if self.password.hash_cost < MIN_HASH_COST {
            return Err(ConfigError::InvalidValue(format!(
                "password.hash_cost must be at least {}",
                MIN_HASH_COST
            )));
        }
        Ok(())
    }
}

/// Load settings from the optional `configuration` file with an
/// `APP__`-prefixed environment overlay (e.g. `APP__JWT__ISSUER`).
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("jwt.audience")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            database: DatabaseSettings {
                username: "postgres".to_string(),
                password: "password".to_string(),
                port: 5432,
                host: "localhost".to_string(),
                database_name: "auth".to_string(),
            },
            application: ApplicationSettings { port: 8080 },
            jwt: JwtSettings {
                access_token_secret: "access-secret-0123456789-0123456789-ok".to_string(),
                refresh_token_secret: "refresh-secret-0123456789-0123456789-ok".to_string(),
                access_token_expiry: 3600,
                refresh_token_expiry: 2_592_000,
                issuer: "auth".to_string(),
                audience: vec!["svc-a".to_string()],
            },
            password: PasswordSettings { hash_cost: 12 },
        }
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut settings = valid_settings();
        settings.jwt.access_token_secret = "too-short".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_equal_secrets_rejected() {
        let mut settings = valid_settings();
        settings.jwt.refresh_token_secret = settings.jwt.access_token_secret.clone();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_empty_issuer_and_audience_rejected() {
        let mut settings = valid_settings();
        settings.jwt.issuer = String::new();
        assert!(settings.validate().is_err());

        let mut settings = valid_settings();
        settings.jwt.audience = Vec::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_hash_cost_floor() {
        let mut settings = valid_settings();
        settings.password.hash_cost = 9;
        assert!(settings.validate().is_err());

        settings.password.hash_cost = 10;
        assert!(settings.validate().is_ok());
    }
}
