use anyhow::{anyhow, Context, Result};
use std::env;

use common_auth::{TokenConfig, DEFAULT_TTL_SECONDS};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_seconds: i64,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl ServiceConfig {
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(self.jwt_secret.clone()).with_ttl(self.token_ttl_seconds)
    }
}

pub fn load_config() -> Result<ServiceConfig> {
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
    if jwt_secret.trim().is_empty() {
        return Err(anyhow!("JWT_SECRET must not be empty"));
    }

    let token_ttl_seconds = env::var("TOKEN_TTL_SECONDS")
        .ok()
        .map(|value| parse_ttl(&value))
        .transpose()
        .context("Failed to parse TOKEN_TTL_SECONDS")?
        .unwrap_or(DEFAULT_TTL_SECONDS);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);

    // Bootstrap admin: the privileged role-provisioning path needs one
    // pre-existing admin account.
    let admin_name = env::var("ADMIN_NAME").unwrap_or_else(|_| "site admin".to_string());
    let admin_email = env::var("ADMIN_EMAIL")
        .unwrap_or_else(|_| "a@jwt.com".to_string())
        .to_lowercase();
    let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());

    Ok(ServiceConfig {
        database_url,
        host,
        port,
        jwt_secret,
        token_ttl_seconds,
        admin_name,
        admin_email,
        admin_password,
    })
}

fn parse_ttl(value: &str) -> Result<i64> {
    let seconds: i64 = value
        .trim()
        .parse()
        .map_err(|err| anyhow!("Invalid TTL '{value}': {err}"))?;
    if seconds <= 0 {
        return Err(anyhow!("TTL must be positive, got {seconds}"));
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ttl_accepts_positive_seconds() {
        assert_eq!(parse_ttl("3600").expect("valid ttl"), 3600);
        assert_eq!(parse_ttl(" 86400 ").expect("valid ttl"), 86_400);
    }

    #[test]
    fn parse_ttl_rejects_zero_and_garbage() {
        assert!(parse_ttl("0").is_err());
        assert!(parse_ttl("-5").is_err());
        assert!(parse_ttl("tomorrow").is_err());
    }
}
