use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_GATEWAY_VERSION: &str = "2.1.0";
const DEFAULT_GATEWAY_COMMAND: &str = "pay";
const DEFAULT_GATEWAY_ORDER_TYPE: &str = "other";
const DEFAULT_GATEWAY_CURRENCY: &str = "VND";
const DEFAULT_GATEWAY_LOCALE: &str = "vn";
const DEFAULT_GATEWAY_EXPIRE_MINUTES: i64 = 15;
const DEV_DEFAULT_HASH_SECRET: &str =
    "this_is_a_development_gateway_secret_for_local_sandbox_use_only";

/// Payment gateway configuration. Passed explicitly into the gateway adapter
/// and the payment service; there is no ambient/global secret lookup.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewaySettings {
    /// Merchant code issued by the gateway
    pub merchant_code: String,

    /// Shared HMAC secret (raw bytes, not a derived key)
    #[validate(length(min = 16, message = "Gateway hash secret must be at least 16 characters"))]
    pub hash_secret: String,

    /// Gateway payment page base URL
    pub base_url: String,

    /// Callback endpoint the gateway redirects back to
    pub return_url: String,

    /// Browser redirect target after a successful callback
    pub success_redirect_url: String,

    /// Browser redirect target after a failed or forged callback
    pub failure_redirect_url: String,

    /// Protocol version constant
    #[serde(default = "default_gateway_version")]
    pub version: String,

    /// Protocol command constant
    #[serde(default = "default_gateway_command")]
    pub command: String,

    /// Order-type tag sent with every request
    #[serde(default = "default_gateway_order_type")]
    pub order_type: String,

    /// ISO currency code the gateway settles in
    #[serde(default = "default_gateway_currency")]
    pub currency_code: String,

    /// Locale for the hosted payment page
    #[serde(default = "default_gateway_locale")]
    pub locale: String,

    /// Minutes until an issued redirect expires
    #[serde(default = "default_gateway_expire_minutes")]
    pub expire_minutes: i64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            merchant_code: "SANDBOX".to_string(),
            hash_secret: DEV_DEFAULT_HASH_SECRET.to_string(),
            base_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:8080/payment/gateway/return".to_string(),
            success_redirect_url: "http://localhost:3000/orders/success".to_string(),
            failure_redirect_url: "http://localhost:3000/orders/failed".to_string(),
            version: default_gateway_version(),
            command: default_gateway_command(),
            order_type: default_gateway_order_type(),
            currency_code: default_gateway_currency(),
            locale: default_gateway_locale(),
            expire_minutes: default_gateway_expire_minutes(),
        }
    }
}

/// Pricing policy applied at order creation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OrderSettings {
    /// Tax rate as a decimal fraction (e.g. 0.08 for 8%)
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,

    /// Flat shipping fee added to every order
    #[serde(default = "default_shipping_fee")]
    pub shipping_fee: Decimal,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            shipping_fee: default_shipping_fee(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Order pricing policy
    #[serde(default)]
    pub orders: OrderSettings,

    /// Payment gateway settings
    #[serde(default)]
    #[validate]
    pub gateway: GatewaySettings,
}

impl AppConfig {
    /// Loads configuration from optional files in `config/` layered with
    /// `ORDERFLOW_`-prefixed environment variables, then validates it.
    pub fn load() -> Result<Self, ConfigError> {
        let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
            .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
            .add_source(Environment::with_prefix("ORDERFLOW").separator("__"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_gateway_version() -> String {
    DEFAULT_GATEWAY_VERSION.to_string()
}

fn default_gateway_command() -> String {
    DEFAULT_GATEWAY_COMMAND.to_string()
}

fn default_gateway_order_type() -> String {
    DEFAULT_GATEWAY_ORDER_TYPE.to_string()
}

fn default_gateway_currency() -> String {
    DEFAULT_GATEWAY_CURRENCY.to_string()
}

fn default_gateway_locale() -> String {
    DEFAULT_GATEWAY_LOCALE.to_string()
}

fn default_gateway_expire_minutes() -> i64 {
    DEFAULT_GATEWAY_EXPIRE_MINUTES
}

fn default_tax_rate() -> Decimal {
    Decimal::ZERO
}

fn default_shipping_fee() -> Decimal {
    Decimal::ZERO
}
