// Environment detection and logger bootstrap.

use std::sync::OnceLock;

/// Cached environment mode.
static ENV_MODE: OnceLock<EnvMode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Production,
    Development,
    Test,
}

/// Detect the current environment mode from environment variables.
/// Checks `GUIDESTORE_ENV` and `RUST_ENV` in order.
pub fn detect_env_mode() -> EnvMode {
    *ENV_MODE.get_or_init(|| {
        let env_val = std::env::var("GUIDESTORE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default()
            .to_lowercase();

        match env_val.as_str() {
            "production" | "prod" => EnvMode::Production,
            "test" | "testing" => EnvMode::Test,
            _ => EnvMode::Development,
        }
    })
}

pub fn is_production() -> bool {
    detect_env_mode() == EnvMode::Production
}

pub fn is_development() -> bool {
    detect_env_mode() == EnvMode::Development
}

pub fn is_test() -> bool {
    detect_env_mode() == EnvMode::Test
}

/// Signing secret for admin sessions and identity tokens.
pub fn get_secret_from_env() -> Option<String> {
    std::env::var("GUIDESTORE_SECRET").ok()
}

/// Shared admin password for the back-office endpoints.
pub fn get_admin_password_from_env() -> Option<String> {
    std::env::var("GUIDESTORE_ADMIN_PASSWORD").ok()
}

pub fn get_stripe_secret_key_from_env() -> Option<String> {
    std::env::var("STRIPE_SECRET_KEY").ok()
}

pub fn get_stripe_webhook_secret_from_env() -> Option<String> {
    std::env::var("STRIPE_WEBHOOK_SECRET").ok()
}

pub fn get_email_api_key_from_env() -> Option<String> {
    std::env::var("EMAIL_API_KEY").ok()
}

/// Initialize the `tracing` subscriber with appropriate defaults.
/// Honors `RUST_LOG` when set; otherwise info in production, debug elsewhere.
pub fn init_logger() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production() {
            EnvFilter::new("guidestore=info")
        } else {
            EnvFilter::new("guidestore=debug")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
