use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub listen_addr: String,
    pub cors_origins: Vec<String>,
    /// Public base URL of the web app, used to build invite links.
    pub base_url: String,
    /// Organisation creation is gated on billing being enabled.
    pub billing_enabled: bool,
    pub mail: Option<MailConfig>,
}

/// Credentials for the provider mail HTTP API. When absent, invite emails
/// are logged instead of sent.
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub api_url: String,
    pub api_token: String,
    pub from_name: String,
    pub from_address: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters for security");
        }
        if jwt_secret.contains("change_me") {
            anyhow::bail!("JWT_SECRET contains placeholder value; set a real secret before running");
        }

        let mail = match (std::env::var("MAIL_API_URL"), std::env::var("MAIL_API_TOKEN")) {
            (Ok(api_url), Ok(api_token)) => Some(MailConfig {
                api_url,
                api_token,
                from_name: std::env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "Quillsign".into()),
                from_address: std::env::var("MAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "noreply@quillsign.app".into()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "12".into())
                .parse()
                .context("JWT_EXPIRY_HOURS must be a number")?,
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            billing_enabled: std::env::var("BILLING_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            mail,
        })
    }
}
