use anyhow::{Context, Result, bail};

/// Bot route registered with AppAPI when `BOT_ROUTE` is not set.
pub const DEFAULT_BOT_ROUTE: &str = "assistant_talk_bot";

/// Process-wide configuration, loaded once at startup.
///
/// Values come from the environment (the deployment contract for ExApps);
/// a missing required value aborts startup before the server binds.
#[derive(Debug, Clone)]
pub struct Config {
    /// Normalized Nextcloud base URL (no `/index.php`, no trailing slash).
    pub nextcloud_url: String,
    pub app_id: String,
    pub app_version: String,
    pub app_secret: String,
    pub host: String,
    pub port: u16,
    /// Route under which the bot is registered and receives Talk webhooks.
    pub bot_route: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            nextcloud_url: normalize_base_url(&require_env("NEXTCLOUD_URL")?),
            app_id: require_env("APP_ID")?,
            app_version: require_env("APP_VERSION")?,
            app_secret: require_env("APP_SECRET")?,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: require_env("APP_PORT")?
                .parse()
                .context("APP_PORT must be a valid port number")?,
            bot_route: std::env::var("BOT_ROUTE")
                .unwrap_or_else(|_| DEFAULT_BOT_ROUTE.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.nextcloud_url)
            .with_context(|| format!("NEXTCLOUD_URL is not a valid URL: {}", self.nextcloud_url))?;
        for (name, value) in [
            ("APP_ID", &self.app_id),
            ("APP_VERSION", &self.app_version),
            ("APP_SECRET", &self.app_secret),
        ] {
            if value.is_empty() {
                bail!("{} must not be empty", name);
            }
        }
        // App id and version travel in HTTP headers on every platform call.
        for (name, value) in [("APP_ID", &self.app_id), ("APP_VERSION", &self.app_version)] {
            if !value.chars().all(|c| c.is_ascii_graphic()) {
                bail!("{} must be printable ASCII without spaces", name);
            }
        }
        if self.bot_route.is_empty() || self.bot_route.contains('/') {
            bail!("BOT_ROUTE must be a single non-empty path segment");
        }
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("missing required environment variable {}", name))
}

/// Strip a `/index.php` suffix and trailing slashes from the platform URL.
pub(crate) fn normalize_base_url(raw: &str) -> String {
    let url = raw.trim().trim_end_matches('/');
    let url = url.strip_suffix("/index.php").unwrap_or(url);
    url.trim_end_matches('/').to_string()
}
