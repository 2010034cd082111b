//! Payment processing: gateway redirect issuance and callback settlement.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::GatewaySettings;
use crate::entities::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::adapter::{RESPONSE_CODE_FIELD, RESPONSE_CODE_SUCCESS, TXN_REF_FIELD};
use crate::gateway::{signature, GatewayAdapter};
use crate::store::Store;

use super::order_status;

const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    /// Must exactly equal the order's stored total.
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    /// Origin IP forwarded to the gateway; defaults to loopback.
    #[serde(default)]
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub order_id: Uuid,
    pub transaction_id: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Decimal,
    /// Redirect to the hosted payment page; `None` for non-gateway methods.
    pub payment_url: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of handling a gateway callback. The redirect target is returned to
/// the browser regardless of whether the callback was trusted.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackOutcome {
    pub order_id: Uuid,
    /// Whether the callback was authenticated and reported success.
    pub accepted: bool,
    pub redirect_url: String,
}

/// Settles payments against orders: builds signed redirects and consumes
/// gateway callbacks.
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn Store>,
    settings: Arc<GatewaySettings>,
    adapter: GatewayAdapter,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn Store>,
        settings: Arc<GatewaySettings>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let adapter = GatewayAdapter::new(settings.clone());
        Self {
            store,
            settings,
            adapter,
            event_sender,
        }
    }

    /// Initiates payment for an order. Fails with
    /// [`ServiceError::PaymentFailed`] before building anything when the
    /// supplied amount does not exactly equal the stored order total.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, payment_method = %request.payment_method))]
    pub async fn process_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentResponse, ServiceError> {
        let mut txn = self.store.begin().await?;
        let order = txn.order_by_id(request.order_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Order not found with id: {}", request.order_id))
        })?;
        drop(txn);

        if request.amount != order.total {
            return Err(ServiceError::PaymentFailed(
                "Payment amount does not match order total".to_string(),
            ));
        }

        // One handler per payment method.
        match request.payment_method {
            PaymentMethod::Gateway => self.gateway_payment(&request, &order).await,
            PaymentMethod::Cod => Ok(Self::cod_payment(&request, &order)),
        }
    }

    async fn gateway_payment(
        &self,
        request: &PaymentRequest,
        order: &Order,
    ) -> Result<PaymentResponse, ServiceError> {
        let client_ip = request.client_ip.as_deref().unwrap_or(DEFAULT_CLIENT_IP);
        let payment_url = self.adapter.build_redirect(order, client_ip)?;

        info!(order_id = %order.id, tracking_number = %order.tracking_number, "gateway redirect issued");
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PaymentRedirectIssued { order_id: order.id })
                .await
            {
                warn!(error = %e, order_id = %order.id, "failed to send redirect issued event");
            }
        }

        Ok(PaymentResponse {
            order_id: order.id,
            transaction_id: order.tracking_number.clone(),
            payment_method: PaymentMethod::Gateway,
            status: PaymentStatus::Pending,
            amount: request.amount,
            payment_url: Some(payment_url),
            message: None,
            created_at: Utc::now(),
        })
    }

    fn cod_payment(request: &PaymentRequest, order: &Order) -> PaymentResponse {
        PaymentResponse {
            order_id: order.id,
            transaction_id: order.tracking_number.clone(),
            payment_method: PaymentMethod::Cod,
            status: PaymentStatus::Pending,
            amount: request.amount,
            payment_url: None,
            message: Some("Cash on delivery: payment is collected on fulfillment".to_string()),
            created_at: Utc::now(),
        }
    }

    /// Consumes a gateway callback.
    ///
    /// The signature is checked before the reported response code is
    /// trusted: a forged or corrupted callback forces the order to
    /// `cancelled` and still returns a normal failure redirect (never an
    /// error to the gateway). An authenticated `"00"` moves the order to
    /// `processing`/paid; any other authenticated code cancels it. Safe to
    /// invoke repeatedly for the same tracking number: same-state
    /// transitions are no-ops and stock release only fires on the genuine
    /// cancel edge.
    #[instrument(skip(self, params))]
    pub async fn handle_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<CallbackOutcome, ServiceError> {
        let txn_ref = params
            .get(TXN_REF_FIELD)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError(
                    "Callback is missing the transaction reference".to_string(),
                )
            })?;

        let mut txn = self.store.begin().await?;
        let mut order = txn
            .order_by_tracking_number(txn_ref)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Order not found with tracking number: {}",
                    txn_ref
                ))
            })?;

        let trusted = signature::verify(params, &self.settings.hash_secret);
        let accepted = trusted
            && params.get(RESPONSE_CODE_FIELD).map(String::as_str)
                == Some(RESPONSE_CODE_SUCCESS);

        if !trusted {
            warn!(tracking_number = %txn_ref, "callback signature verification failed");
        }

        let target = if accepted {
            OrderStatus::Processing
        } else {
            OrderStatus::Cancelled
        };

        match order_status::transition(txn.as_mut(), &mut order, target).await {
            Ok(_) => {}
            // A callback for an order already outside the payable window
            // (e.g. shipped, or cancelled then retried with success) must
            // not crash the return path; the order is left as it is.
            Err(ServiceError::InvalidTransition { from, to }) => {
                warn!(
                    tracking_number = %txn_ref,
                    from = %from,
                    to = %to,
                    "ignoring callback transition outside the state graph"
                );
            }
            Err(e) => return Err(e),
        }
        txn.commit().await?;

        let settled = accepted && order.status == OrderStatus::Processing;
        info!(
            order_id = %order.id,
            tracking_number = %txn_ref,
            trusted,
            settled,
            "payment callback processed"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PaymentCallbackProcessed {
                    order_id: order.id,
                    accepted: settled,
                })
                .await
            {
                warn!(error = %e, order_id = %order.id, "failed to send callback event");
            }
        }

        let redirect_url = if settled {
            self.settings.success_redirect_url.clone()
        } else {
            self.settings.failure_redirect_url.clone()
        };

        Ok(CallbackOutcome {
            order_id: order.id,
            accepted: settled,
            redirect_url,
        })
    }
}
