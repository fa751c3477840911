// config.rs
use bigdecimal::BigDecimal;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    /// Fraction in [0, 1] applied to every gross payment.
    pub platform_commission_rate: BigDecimal,
    /// Days funds stay pending on the professional side after a transfer.
    pub hold_period_days: i64,
    /// Seconds between hold-release sweeps.
    pub release_sweep_interval_secs: u64,
    pub gateway: GatewayConfig,
}

/// Explicit gateway configuration, validated at startup. Replaces the
/// dynamic provider payloads the platform used to pass around.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_login_id: String,
    pub transaction_key: String,
    pub sandbox: bool,
    pub currency: String,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.api_login_id.is_empty() {
            return Err("GATEWAY_API_LOGIN_ID must not be empty".to_string());
        }
        if self.transaction_key.is_empty() {
            return Err("GATEWAY_TRANSACTION_KEY must not be empty".to_string());
        }
        if self.currency.len() != 3 {
            return Err(format!(
                "GATEWAY_CURRENCY must be a 3-letter code, got '{}'",
                self.currency
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");

        let platform_commission_rate = std::env::var("PLATFORM_COMMISSION_RATE")
            .unwrap_or_else(|_| "0.15".to_string());
        let platform_commission_rate = BigDecimal::from_str(&platform_commission_rate)
            .expect("PLATFORM_COMMISSION_RATE must be a decimal fraction");
        if platform_commission_rate < BigDecimal::from(0)
            || platform_commission_rate > BigDecimal::from(1)
        {
            panic!("PLATFORM_COMMISSION_RATE must be within [0, 1]");
        }

        let hold_period_days = std::env::var("HOLD_PERIOD_DAYS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<i64>()
            .expect("HOLD_PERIOD_DAYS must be an integer");

        let release_sweep_interval_secs = std::env::var("RELEASE_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()
            .expect("RELEASE_SWEEP_INTERVAL_SECS must be an integer");

        let gateway = GatewayConfig {
            api_login_id: std::env::var("GATEWAY_API_LOGIN_ID")
                .unwrap_or_else(|_| "test_login".to_string()),
            transaction_key: std::env::var("GATEWAY_TRANSACTION_KEY")
                .unwrap_or_else(|_| "test_key".to_string()),
            sandbox: std::env::var("GATEWAY_SANDBOX")
                .map(|v| v != "false")
                .unwrap_or(true),
            currency: std::env::var("GATEWAY_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
        };
        if let Err(message) = gateway.validate() {
            panic!("Invalid gateway configuration: {}", message);
        }

        Config {
            database_url,
            jwt_secret,
            jwt_maxage: jwt_maxage.parse::<i64>().unwrap(),
            port: 8000,
            platform_commission_rate,
            hold_period_days,
            release_sweep_interval_secs,
            gateway,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_gateway() -> GatewayConfig {
        GatewayConfig {
            api_login_id: "login".to_string(),
            transaction_key: "key".to_string(),
            sandbox: true,
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn test_gateway_validation_accepts_complete_config() {
        assert!(valid_gateway().validate().is_ok());
    }

    #[test]
    fn test_gateway_validation_rejects_missing_credentials() {
        let mut config = valid_gateway();
        config.api_login_id = String::new();
        assert!(config.validate().is_err());

        let mut config = valid_gateway();
        config.transaction_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gateway_validation_rejects_bad_currency() {
        let mut config = valid_gateway();
        config.currency = "DOLLARS".to_string();
        assert!(config.validate().is_err());
    }
}
