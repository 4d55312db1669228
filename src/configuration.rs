use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub email_client: EmailClientSettings,
    pub payments: PaymentSettings,
    pub uploads: UploadSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// Public URL used in emails and payment redirects
    pub base_url: String,
}

/// Runtime mode, controls how much error detail leaves the server
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "String")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `development` or `production`.",
                other
            )),
        }
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
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
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub expires_in_days: i64,
    pub cookie_expires_in_days: i64,
    pub issuer: String,
}

impl JwtSettings {
    pub fn expiry_seconds(&self) -> i64 {
        self.expires_in_days * 24 * 60 * 60
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub sender_name: String,
    pub authorization_token: String,
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

/// Hosted checkout provider
#[derive(serde::Deserialize, Clone)]
pub struct PaymentSettings {
    pub api_base_url: String,
    pub secret_key: String,
    pub currency: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct UploadSettings {
    /// Public asset folder served under `/css`, `/js` and `/img`
    pub directory: String,
}

impl UploadSettings {
    pub fn public_dir(&self) -> String {
        self.directory.trim_end_matches('/').to_string()
    }

    /// Uploaded photos go to `users/` and `tours/` below this folder
    pub fn image_dir(&self) -> String {
        format!("{}/img", self.public_dir())
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_seconds: u64,
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        // e.g. `APP__JWT__SECRET=...` overrides `jwt.secret`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
