use std::env;

/// Message TTL window (seconds). Creates outside [min, max] are rejected.
pub const DEFAULT_TTL_SECS: i64 = 86_400;
pub const MAX_TTL_SECS: i64 = 604_800;
pub const MIN_TTL_SECS: i64 = 3_600;

/// Runtime configuration. All values read from environment variables with
/// sensible defaults; tests construct this directly to avoid env var races.
///
/// Environment variables:
/// - `FRONTEND_BASE_URL` — base for shareable `/m/{id}#{key}` URLs (default: `http://localhost:8000`)
/// - `ALLOWED_ORIGINS` — comma-separated CORS origins (default: empty = all)
/// - `SESSION_SECRET` — HS256 signing secret for session tokens
/// - `SESSION_LIFETIME_HOURS` — session token lifetime (default: 24)
/// - `MESSAGE_DEFAULT_TTL_SECS` / `MESSAGE_MAX_TTL_SECS` / `MESSAGE_MIN_TTL_SECS`
/// - `VAULT_MAX_BYTES` — ciphertext memory cap (default: 64 MiB)
/// - `ADMIN_EMAIL` — reserved bootstrap admin account (default: `admin@vanish.local`)
/// - `ALLOW_SERVER_KEY_COPY` — accept the optional `encryption_key` field on
///   create (default: true). When false, creates carrying the field are rejected.
/// - `SWEEP_INTERVAL_SECS` — metadata/vault sweep cadence (default: 300)
/// - `OKTA_ENABLED`, `OKTA_DOMAIN`, `OKTA_CLIENT_ID`, `OKTA_CLIENT_SECRET`, `OKTA_REDIRECT_URI`
/// - `SLACK_ENABLED`, `SLACK_BOT_TOKEN`, `SLACK_SIGNING_SECRET`
/// - `EMAIL_ENABLED`, `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`,
///   `SMTP_FROM_ADDRESS`, `SMTP_FROM_NAME`
#[derive(Clone)]
pub struct AppConfig {
    pub frontend_base_url: String,
    pub allowed_origins: Vec<String>,

    pub session_secret: String,
    pub session_lifetime_hours: i64,

    pub default_ttl_secs: i64,
    pub max_ttl_secs: i64,
    pub min_ttl_secs: i64,

    pub vault_max_bytes: usize,

    pub admin_email: String,
    pub allow_server_key_copy: bool,

    pub sweep_interval_secs: u64,

    pub okta: OktaConfig,
    pub slack: SlackConfig,
    pub email: EmailConfig,
}

#[derive(Clone)]
pub struct OktaConfig {
    pub enabled: bool,
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Clone)]
pub struct SlackConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub signing_secret: String,
}

#[derive(Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub from_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frontend_base_url: "http://localhost:8000".to_string(),
            allowed_origins: Vec::new(),
            session_secret: String::new(),
            session_lifetime_hours: 24,
            default_ttl_secs: DEFAULT_TTL_SECS,
            max_ttl_secs: MAX_TTL_SECS,
            min_ttl_secs: MIN_TTL_SECS,
            vault_max_bytes: 64 * 1024 * 1024,
            admin_email: "admin@vanish.local".to_string(),
            allow_server_key_copy: true,
            sweep_interval_secs: 300,
            okta: OktaConfig {
                enabled: false,
                domain: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
                redirect_uri: String::new(),
            },
            slack: SlackConfig {
                enabled: false,
                bot_token: String::new(),
                signing_secret: String::new(),
            },
            email: EmailConfig {
                enabled: false,
                smtp_host: String::new(),
                smtp_port: 587,
                smtp_username: String::new(),
                smtp_password: String::new(),
                from_address: "vanish@localhost".to_string(),
                from_name: "Vanish".to_string(),
            },
        }
    }
}

fn env_string(key: &str, target: &mut String) {
    if let Ok(val) = env::var(key)
        && !val.is_empty()
    {
        *target = val;
    }
}

fn env_bool(key: &str, target: &mut bool) {
    if let Ok(val) = env::var(key) {
        *target = val != "0" && val.to_lowercase() != "false";
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = env::var(key)
        && let Ok(n) = val.parse::<T>()
    {
        *target = n;
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        env_string("FRONTEND_BASE_URL", &mut config.frontend_base_url);
        if let Ok(val) = env::var("ALLOWED_ORIGINS") {
            config.allowed_origins = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        env_string("SESSION_SECRET", &mut config.session_secret);
        env_parse("SESSION_LIFETIME_HOURS", &mut config.session_lifetime_hours);

        env_parse("MESSAGE_DEFAULT_TTL_SECS", &mut config.default_ttl_secs);
        env_parse("MESSAGE_MAX_TTL_SECS", &mut config.max_ttl_secs);
        env_parse("MESSAGE_MIN_TTL_SECS", &mut config.min_ttl_secs);

        env_parse("VAULT_MAX_BYTES", &mut config.vault_max_bytes);

        env_string("ADMIN_EMAIL", &mut config.admin_email);
        env_bool("ALLOW_SERVER_KEY_COPY", &mut config.allow_server_key_copy);

        env_parse("SWEEP_INTERVAL_SECS", &mut config.sweep_interval_secs);

        env_bool("OKTA_ENABLED", &mut config.okta.enabled);
        env_string("OKTA_DOMAIN", &mut config.okta.domain);
        env_string("OKTA_CLIENT_ID", &mut config.okta.client_id);
        env_string("OKTA_CLIENT_SECRET", &mut config.okta.client_secret);
        env_string("OKTA_REDIRECT_URI", &mut config.okta.redirect_uri);

        env_bool("SLACK_ENABLED", &mut config.slack.enabled);
        env_string("SLACK_BOT_TOKEN", &mut config.slack.bot_token);
        env_string("SLACK_SIGNING_SECRET", &mut config.slack.signing_secret);

        env_bool("EMAIL_ENABLED", &mut config.email.enabled);
        env_string("SMTP_HOST", &mut config.email.smtp_host);
        env_parse("SMTP_PORT", &mut config.email.smtp_port);
        env_string("SMTP_USERNAME", &mut config.email.smtp_username);
        env_string("SMTP_PASSWORD", &mut config.email.smtp_password);
        env_string("SMTP_FROM_ADDRESS", &mut config.email.from_address);
        env_string("SMTP_FROM_NAME", &mut config.email.from_name);

        config
    }

    /// Shareable URL for a message. The key rides in the fragment, which
    /// browsers never transmit back to the server.
    pub fn share_url(&self, message_id: &str, key: Option<&str>) -> String {
        let base = self.frontend_base_url.trim_end_matches('/');
        match key {
            Some(k) if !k.is_empty() => format!("{}/m/{}#{}", base, message_id, k),
            _ => format!("{}/m/{}", base, message_id),
        }
    }
}
