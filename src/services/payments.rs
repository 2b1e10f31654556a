//! VNPAY payment gateway adapter.
//!
//! Outbound: a signed redirect URL for an unpaid order. Inbound: signature
//! verification of the gateway's return callback followed by a conditional
//! "mark paid" write.

use crate::{
    config::GatewayConfig,
    db::DbPool,
    entities::order::{self, OrderStatus, PaymentMethod},
    errors::ServiceError,
    events::{Event, EventSender, PaymentSource},
    services::orders::amounts_match,
};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use metrics::counter;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use sha2::Sha512;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::{form_urlencoded::byte_serialize, Url};
use utoipa::ToSchema;
use uuid::Uuid;

type HmacSha512 = Hmac<Sha512>;

pub const SECURE_HASH_PARAM: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE_PARAM: &str = "vnp_SecureHashType";
const SUCCESS_CODE: &str = "00";
const VNPAY_VERSION: &str = "2.1.0";
const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// What the adapter needs to build a redirect
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    /// Amount in the storefront's display currency
    pub amount: Decimal,
    pub order_info: Option<String>,
    pub locale: Option<String>,
    pub client_ip: String,
}

/// Outcome of checking a callback's signature and status codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackVerification {
    pub valid: bool,
    /// Order id taken from `vnp_TxnRef` (text before the first `_`)
    pub order_ref: Option<String>,
    pub success: bool,
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// Encodes every key and value, sorts by encoded key and joins as `k=v&k=v`
pub fn canonical_query<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut encoded: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort_by(|a, b| a.0.cmp(&b.0));

    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds and verifies VNPAY requests using an injected [`GatewayConfig`]
#[derive(Debug, Clone)]
pub struct VnpayGateway {
    config: GatewayConfig,
}

impl VnpayGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn mac(&self) -> Result<HmacSha512, ServiceError> {
        HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("Invalid gateway secret: {}", e)))
    }

    /// Hex HMAC-SHA512 of `data` under the shared secret
    pub fn sign(&self, data: &str) -> Result<String, ServiceError> {
        let mut mac = self.mac()?;
        mac.update(data.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Settlement amount in minor units: round(amount * rate) * 100
    pub fn settlement_amount(&self, amount: Decimal) -> Decimal {
        (amount * self.config.exchange_rate)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            * Decimal::ONE_HUNDRED
    }

    pub fn build_payment_url(&self, request: &PaymentRequest) -> Result<String, ServiceError> {
        self.build_payment_url_at(request, Utc::now())
    }

    /// Builds the signed redirect URL as of `now`
    pub fn build_payment_url_at(
        &self,
        request: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let offset = FixedOffset::east_opt(self.config.utc_offset_hours * 3600).ok_or_else(|| {
            ServiceError::InternalError("Invalid gateway UTC offset".to_string())
        })?;
        let local = now.with_timezone(&offset);
        let create_date = local.format(DATE_FORMAT).to_string();
        let expire_date = (local + Duration::minutes(self.config.expire_minutes))
            .format(DATE_FORMAT)
            .to_string();

        let order_id = request.order_id.to_string();
        let order_info = request
            .order_info
            .clone()
            .filter(|info| !info.trim().is_empty())
            .unwrap_or_else(|| format!("Thanh toan don hang {}", order_id));
        let locale = request
            .locale
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.config.locale.clone());
        let amount = self.settlement_amount(request.amount).normalize().to_string();

        let mut params: Vec<(&str, String)> = vec![
            ("vnp_Version", VNPAY_VERSION.to_string()),
            ("vnp_Command", "pay".to_string()),
            ("vnp_TmnCode", self.config.tmn_code.clone()),
            ("vnp_Locale", locale),
            ("vnp_CurrCode", "VND".to_string()),
            ("vnp_TxnRef", order_id),
            ("vnp_OrderInfo", order_info),
            ("vnp_OrderType", "billpayment".to_string()),
            ("vnp_Amount", amount),
            ("vnp_ReturnUrl", self.config.return_url.clone()),
            ("vnp_IpAddr", request.client_ip.clone()),
            ("vnp_CreateDate", create_date),
            ("vnp_ExpireDate", expire_date),
        ];
        if let Some(bank_code) = self.config.bank_code.as_ref().filter(|c| !c.is_empty()) {
            params.push(("vnp_BankCode", bank_code.clone()));
        }

        let sign_data = canonical_query(params.iter().map(|(k, v)| (*k, v.as_str())));
        let secure_hash = self.sign(&sign_data)?;

        let mut url = Url::parse(&self.config.payment_url).map_err(|e| {
            ServiceError::InternalError(format!("Invalid gateway payment URL: {}", e))
        })?;
        url.set_query(Some(&format!(
            "{}&{}={}",
            sign_data, SECURE_HASH_PARAM, secure_hash
        )));

        Ok(url.into())
    }

    /// Recomputes the signature over every parameter except the hash fields
    /// and compares it in constant time with the provided one
    pub fn verify_callback(&self, params: &HashMap<String, String>) -> CallbackVerification {
        let order_ref = params
            .get("vnp_TxnRef")
            .and_then(|r| r.split('_').next())
            .map(str::to_string);

        let valid = self.signature_matches(params);
        let success = valid
            && params.get("vnp_ResponseCode").map(String::as_str) == Some(SUCCESS_CODE)
            && params.get("vnp_TransactionStatus").map(String::as_str) == Some(SUCCESS_CODE);

        CallbackVerification {
            valid,
            order_ref,
            success,
        }
    }

    fn signature_matches(&self, params: &HashMap<String, String>) -> bool {
        let Some(provided) = params.get(SECURE_HASH_PARAM) else {
            return false;
        };
        let Ok(provided) = hex::decode(provided.trim()) else {
            return false;
        };

        let sign_data = canonical_query(
            params
                .iter()
                .filter(|(k, _)| k.as_str() != SECURE_HASH_PARAM && k.as_str() != SECURE_HASH_TYPE_PARAM)
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );

        match self.mac() {
            Ok(mut mac) => {
                mac.update(sign_data.as_bytes());
                mac.verify_slice(&provided).is_ok()
            }
            Err(_) => false,
        }
    }
}

/// Body of `POST /api/vnpay/create-payment`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    #[serde(default)]
    pub order_description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// What a verified callback did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Payment succeeded. `newly_paid` is false when the order was already paid.
    Paid { order_id: Uuid, newly_paid: bool },
    /// Signature was valid but the gateway reported a failure
    Failed { order_ref: Option<String> },
}

/// Payment requests, gateway callbacks and manual payment marks
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    gateway: VnpayGateway,
    event_sender: Arc<EventSender>,
}

impl PaymentService {
    pub fn new(db_pool: Arc<DbPool>, gateway: VnpayGateway, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            gateway,
            event_sender,
        }
    }

    pub fn gateway(&self) -> &VnpayGateway {
        &self.gateway
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Failed to load order");
                ServiceError::DatabaseError(e)
            })
    }

    /// Builds the gateway redirect for an unpaid order owned by `user_id`
    #[instrument(skip(self, request, client_ip), fields(order_id = %request.order_id))]
    pub async fn create_payment(
        &self,
        user_id: Uuid,
        request: CreatePaymentRequest,
        client_ip: String,
    ) -> Result<String, ServiceError> {
        let order = self
            .find_order(request.order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if order.payment {
            return Err(ServiceError::BadRequest("Order already paid".to_string()));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::BadRequest(
                "Order has been cancelled".to_string(),
            ));
        }
        if !amounts_match(order.amount, request.amount) {
            return Err(ServiceError::BadRequest(format!(
                "Payment amount does not match order amount. Expected: {}, Got: {}",
                order.amount.normalize(),
                request.amount.normalize()
            )));
        }

        let url = self.gateway.build_payment_url(&PaymentRequest {
            order_id: order.id,
            amount: order.amount,
            order_info: request.order_description,
            locale: request.language,
            client_ip,
        })?;

        info!(order_id = %order.id, "Payment URL created");
        Ok(url)
    }

    /// Handles the gateway's return callback
    #[instrument(skip(self, params))]
    pub async fn handle_return(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<CallbackOutcome, ServiceError> {
        let verification = self.gateway.verify_callback(params);

        if !verification.valid {
            counter!("orchard.payments.signature_rejected", 1);
            warn!(
                txn_ref = verification.order_ref.as_deref().unwrap_or("-"),
                "Rejected gateway callback with invalid signature"
            );
            return Err(ServiceError::InvalidSignature);
        }

        if !verification.success {
            info!(
                txn_ref = verification.order_ref.as_deref().unwrap_or("-"),
                response_code = params.get("vnp_ResponseCode").map(String::as_str).unwrap_or("-"),
                "Gateway reported payment failure"
            );
            return Ok(CallbackOutcome::Failed {
                order_ref: verification.order_ref,
            });
        }

        let order_id = verification
            .order_ref
            .as_deref()
            .and_then(|r| Uuid::parse_str(r).ok())
            .ok_or_else(|| ServiceError::BadRequest("Invalid order reference".to_string()))?;

        let newly_paid = self
            .mark_paid(order_id, Some(PaymentMethod::Vnpay), PaymentSource::Gateway)
            .await?;

        Ok(CallbackOutcome::Paid {
            order_id,
            newly_paid,
        })
    }

    /// Sets `payment = true` only where it is still false, in one conditional
    /// update. Returns whether this call flipped the flag; a repeat is a no-op.
    #[instrument(skip(self))]
    pub async fn mark_paid(
        &self,
        order_id: Uuid,
        method: Option<PaymentMethod>,
        source: PaymentSource,
    ) -> Result<bool, ServiceError> {
        let mut update = order::Entity::update_many()
            .col_expr(order::Column::Payment, Expr::value(true))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(method) = method {
            update = update.col_expr(order::Column::PaymentMethod, Expr::value(method));
        }

        let result = update
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Payment.eq(false))
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Failed to mark order paid");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            return match self.find_order(order_id).await? {
                Some(_) => {
                    info!(%order_id, "Order already paid");
                    Ok(false)
                }
                None => Err(ServiceError::NotFound("Order not found".to_string())),
            };
        }

        counter!("orchard.payments.confirmed", 1);
        info!(%order_id, %source, "Order marked paid");
        self.event_sender
            .send_or_log(Event::PaymentConfirmed { order_id, source })
            .await;
        Ok(true)
    }
}
