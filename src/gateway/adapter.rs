//! Outbound payment request construction.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use crate::config::GatewaySettings;
use crate::entities::Order;
use crate::errors::ServiceError;

use super::signature::{self, SIGNATURE_FIELD};

/// Transaction reference field; carries the order's tracking number.
pub const TXN_REF_FIELD: &str = "vnp_TxnRef";
/// Gateway result field on callbacks; "00" reports success.
pub const RESPONSE_CODE_FIELD: &str = "vnp_ResponseCode";
pub const RESPONSE_CODE_SUCCESS: &str = "00";

/// The gateway operates on UTC+7 wall-clock timestamps.
const GATEWAY_UTC_OFFSET_SECS: i32 = 7 * 3600;
const GATEWAY_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Builds signed redirect URLs for the hosted payment page.
#[derive(Clone)]
pub struct GatewayAdapter {
    settings: Arc<GatewaySettings>,
}

impl GatewayAdapter {
    pub fn new(settings: Arc<GatewaySettings>) -> Self {
        Self { settings }
    }

    /// Builds the full redirect URL for `order`:
    /// `<base>?<sorted encoded query>&vnp_SecureHash=<signature>`.
    #[instrument(skip(self, order), fields(order_id = %order.id, tracking_number = %order.tracking_number))]
    pub fn build_redirect(&self, order: &Order, client_ip: &str) -> Result<String, ServiceError> {
        self.build_redirect_at(order, client_ip, Utc::now())
    }

    /// Same as [`build_redirect`](Self::build_redirect) with an explicit
    /// clock, so the timestamp fields are testable.
    pub fn build_redirect_at(
        &self,
        order: &Order,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let amount = amount_in_minor_units(order.total)?;
        let expires = now + Duration::minutes(self.settings.expire_minutes);

        let mut params = HashMap::new();
        params.insert("vnp_Version".to_string(), self.settings.version.clone());
        params.insert("vnp_Command".to_string(), self.settings.command.clone());
        params.insert(
            "vnp_TmnCode".to_string(),
            self.settings.merchant_code.clone(),
        );
        params.insert("vnp_Amount".to_string(), amount.to_string());
        params.insert(
            "vnp_CurrCode".to_string(),
            self.settings.currency_code.clone(),
        );
        params.insert(TXN_REF_FIELD.to_string(), order.tracking_number.clone());
        params.insert(
            "vnp_OrderInfo".to_string(),
            order_description(order.id, &order.phone),
        );
        params.insert(
            "vnp_OrderType".to_string(),
            self.settings.order_type.clone(),
        );
        params.insert("vnp_Locale".to_string(), self.settings.locale.clone());
        params.insert(
            "vnp_ReturnUrl".to_string(),
            self.settings.return_url.clone(),
        );
        params.insert("vnp_IpAddr".to_string(), client_ip.to_string());
        params.insert("vnp_CreateDate".to_string(), gateway_timestamp(now));
        params.insert("vnp_ExpireDate".to_string(), gateway_timestamp(expires));

        let query = query_string(&params);
        let signature = signature::sign(&params, &self.settings.hash_secret);

        Ok(format!(
            "{}?{}&{}={}",
            self.settings.base_url, query, SIGNATURE_FIELD, signature
        ))
    }
}

/// Scales a 2-fraction-digit amount to the gateway's integer minor units.
pub fn amount_in_minor_units(total: Decimal) -> Result<i64, ServiceError> {
    (total * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| {
            ServiceError::PaymentFailed("Order total overflows gateway minor units".to_string())
        })
}

/// Human-readable order description for the hosted page: characters outside
/// `[A-Za-z0-9 _-]` stripped, then form-encoded (the gateway expects the
/// encoded form as the parameter value).
pub fn order_description(order_id: Uuid, customer: &str) -> String {
    let info = format!("Payment for order {} by {}", order_id, customer);
    let stripped: String = info
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    signature::url_encode(stripped.trim())
}

/// Full query string: every parameter, sorted by key, key and value encoded.
fn query_string(params: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<&str, &str> = params
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    let mut query = String::new();
    for (key, value) in sorted {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&signature::url_encode(key));
        query.push('=');
        query.push_str(&signature::url_encode(value));
    }
    query
}

fn gateway_timestamp(instant: DateTime<Utc>) -> String {
    let offset =
        FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS).expect("gateway UTC offset is in range");
    instant
        .with_timezone(&offset)
        .format(GATEWAY_TIMESTAMP_FORMAT)
        .to_string()
}
