//! Process configuration — loaded once at startup from flags or environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::WebhookError;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Startup configuration. Values are kept raw here and validated by the
/// components that consume them, so a bad value is reported with the
/// variable it came from.
#[derive(Clone, clap::Args)]
pub struct AppConfig {
    /// Shared secret configured on the GitHub App's webhook.
    #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Numeric GitHub App identifier.
    #[arg(long, env = "GITHUB_APP_IDENTIFIER")]
    pub app_id: Option<String>,

    /// Numeric identifier of the installation to act on behalf of.
    #[arg(long, env = "GITHUB_INSTALLATION_IDENTIFIER")]
    pub installation_id: Option<String>,

    /// Path to the App's PEM-encoded private key.
    #[arg(long, env = "GITHUB_PRIVATE_KEY_FILE")]
    pub private_key_file: Option<PathBuf>,

    /// GitHub REST API base URL (override for GitHub Enterprise Server).
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    pub github_api_url: String,

    /// Upper bound on the time spent processing one delivery.
    #[arg(long, env = "WEBHOOK_TIMEOUT_SECS", default_value = "30")]
    pub webhook_timeout_secs: u64,
}

impl AppConfig {
    /// The webhook secret, required and non-empty.
    pub fn webhook_secret(&self) -> Result<SecretString, WebhookError> {
        match self.webhook_secret.as_deref() {
            Some(s) if !s.is_empty() => Ok(SecretString::from(s.to_string())),
            _ => Err(WebhookError::Configuration(
                "GITHUB_WEBHOOK_SECRET is not set".to_string(),
            )),
        }
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[redacted]"))
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key_file", &self.private_key_file)
            .field("github_api_url", &self.github_api_url)
            .field("webhook_timeout_secs", &self.webhook_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        webhook_secret: Some("It's a Secret to Everybody".to_string()),
        app_id: Some("1234".to_string()),
        installation_id: Some("5678".to_string()),
        private_key_file: Some(PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/test-app-key.pem"
        ))),
        github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
        webhook_timeout_secs: 30,
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn webhook_secret_is_required() {
        let mut config = test_config();
        assert_eq!(
            config.webhook_secret().unwrap().expose_secret(),
            "It's a Secret to Everybody"
        );

        config.webhook_secret = Some(String::new());
        assert!(matches!(
            config.webhook_secret(),
            Err(WebhookError::Configuration(_))
        ));

        config.webhook_secret = None;
        assert!(matches!(
            config.webhook_secret(),
            Err(WebhookError::Configuration(_))
        ));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", test_config());
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("Secret to Everybody"));
    }
}
