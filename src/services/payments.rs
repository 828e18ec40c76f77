use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Sha256, Sha512};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    metrics,
    services::checkout::{CheckoutService, Materialized, Settlement},
};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

fn rejected(reason: &str) -> ServiceError {
    metrics::increment(metrics::WEBHOOKS_REJECTED);
    warn!(reason, "webhook signature rejected");
    ServiceError::Unauthorized("Invalid webhook signature".to_string())
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) over
/// `"{t}.{body}"`. Any matching `v1` entry is accepted.
pub fn verify_stripe_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    tolerance_secs: u64,
    now: i64,
) -> Result<(), ServiceError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| rejected("missing timestamp"))?;
    if candidates.is_empty() {
        return Err(rejected("missing v1 signature"));
    }
    let ts: i64 = timestamp.parse().map_err(|_| rejected("bad timestamp"))?;
    if now.abs_diff(ts) > tolerance_secs {
        return Err(rejected("timestamp outside tolerance"));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("Invalid webhook secret".to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = candidates.into_iter().any(|candidate| {
        hex::decode(candidate)
            .map(|sig| mac.clone().verify_slice(&sig).is_ok())
            .unwrap_or(false)
    });
    if matched {
        Ok(())
    } else {
        Err(rejected("signature mismatch"))
    }
}

/// Verify an `x-paystack-signature` header: hex HMAC-SHA512 of the raw body
/// keyed with the secret key.
pub fn verify_paystack_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
) -> Result<(), ServiceError> {
    let signature = hex::decode(header.trim()).map_err(|_| rejected("signature is not hex"))?;
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("Invalid webhook secret".to_string()))?;
    mac.update(payload);
    mac.verify_slice(&signature)
        .map_err(|_| rejected("signature mismatch"))
}

/// What a webhook delivery did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookOutcome {
    /// Orders were created
    Processed,
    /// The reference had already been processed
    Duplicate,
    /// Event type not relevant
    Ignored,
    /// Payment captured but orders could not be created
    Failed,
    /// Provider reported a failed payment; session closed
    PaymentFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
    pub reference: Option<String>,
    pub order_group_id: Option<Uuid>,
}

impl WebhookAck {
    fn ignored() -> Self {
        Self {
            received: true,
            outcome: WebhookOutcome::Ignored,
            reference: None,
            order_group_id: None,
        }
    }
}

/// Payment event after provider-specific parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    Succeeded {
        reference: String,
        payment_reference: Option<String>,
    },
    Failed {
        reference: String,
        reason: String,
    },
    Other(String),
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn missing_reference() -> ServiceError {
    ServiceError::BadRequest("Webhook payload carries no checkout reference".to_string())
}

pub fn parse_stripe_event(payload: &Value) -> Result<PaymentEvent, ServiceError> {
    let kind = str_at(payload, "/type").unwrap_or_default();
    let object = payload.pointer("/data/object").cloned().unwrap_or(Value::Null);
    let reference = || {
        str_at(&object, "/metadata/reference")
            .or_else(|| str_at(&object, "/client_reference_id"))
            .map(str::to_string)
            .ok_or_else(missing_reference)
    };

    match kind {
        "checkout.session.completed" | "payment_intent.succeeded" => {
            let payment_reference = str_at(&object, "/payment_intent")
                .or_else(|| str_at(&object, "/id"))
                .map(str::to_string);
            Ok(PaymentEvent::Succeeded {
                reference: reference()?,
                payment_reference,
            })
        }
        "payment_intent.payment_failed" | "checkout.session.expired" => Ok(PaymentEvent::Failed {
            reference: reference()?,
            reason: format!("Stripe reported {}", kind),
        }),
        other => Ok(PaymentEvent::Other(other.to_string())),
    }
}

pub fn parse_paystack_event(payload: &Value) -> Result<PaymentEvent, ServiceError> {
    let kind = str_at(payload, "/event").unwrap_or_default();
    let reference = || {
        str_at(payload, "/data/reference")
            .map(str::to_string)
            .ok_or_else(missing_reference)
    };

    match kind {
        "charge.success" => {
            let payment_reference = payload
                .pointer("/data/id")
                .map(|id| match id {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            Ok(PaymentEvent::Succeeded {
                reference: reference()?,
                payment_reference,
            })
        }
        "charge.failed" => Ok(PaymentEvent::Failed {
            reference: reference()?,
            reason: "Paystack reported charge.failed".to_string(),
        }),
        other => Ok(PaymentEvent::Other(other.to_string())),
    }
}

#[derive(Clone)]
pub struct PaymentService {
    checkout: CheckoutService,
    stripe_webhook_secret: Option<String>,
    paystack_secret_key: Option<String>,
    tolerance_secs: u64,
}

impl PaymentService {
    pub fn new(
        checkout: CheckoutService,
        stripe_webhook_secret: Option<String>,
        paystack_secret_key: Option<String>,
        tolerance_secs: u64,
    ) -> Self {
        Self {
            checkout,
            stripe_webhook_secret,
            paystack_secret_key,
            tolerance_secs,
        }
    }

    #[instrument(skip_all)]
    pub async fn handle_stripe(
        &self,
        signature: Option<&str>,
        payload: &[u8],
    ) -> Result<WebhookAck, ServiceError> {
        let secret = self
            .stripe_webhook_secret
            .as_deref()
            .ok_or_else(|| rejected("stripe webhook secret not configured"))?;
        let signature = signature.ok_or_else(|| rejected("missing Stripe-Signature header"))?;
        verify_stripe_signature(
            secret,
            signature,
            payload,
            self.tolerance_secs,
            Utc::now().timestamp(),
        )?;

        let event = parse_stripe_event(&parse_json(payload)?)?;
        self.apply(event).await
    }

    #[instrument(skip_all)]
    pub async fn handle_paystack(
        &self,
        signature: Option<&str>,
        payload: &[u8],
    ) -> Result<WebhookAck, ServiceError> {
        let secret = self
            .paystack_secret_key
            .as_deref()
            .ok_or_else(|| rejected("paystack secret key not configured"))?;
        let signature =
            signature.ok_or_else(|| rejected("missing x-paystack-signature header"))?;
        verify_paystack_signature(secret, signature, payload)?;

        let event = parse_paystack_event(&parse_json(payload)?)?;
        self.apply(event).await
    }

    async fn apply(&self, event: PaymentEvent) -> Result<WebhookAck, ServiceError> {
        match event {
            PaymentEvent::Succeeded {
                reference,
                payment_reference,
            } => {
                let outcome = self
                    .checkout
                    .materialize(&reference, Settlement::paid(payment_reference))
                    .await?;
                let (outcome, order_group_id) = match outcome {
                    Materialized::Created { order_group_id, .. } => {
                        (WebhookOutcome::Processed, Some(order_group_id))
                    }
                    Materialized::AlreadyCompleted { order_group_id } => {
                        (WebhookOutcome::Duplicate, order_group_id)
                    }
                    Materialized::Failed { .. } => (WebhookOutcome::Failed, None),
                };
                Ok(WebhookAck {
                    received: true,
                    outcome,
                    reference: Some(reference),
                    order_group_id,
                })
            }
            PaymentEvent::Failed { reference, reason } => {
                let closed = self.checkout.fail_open_session(&reference, &reason).await?;
                info!(%reference, closed, "payment failure reported");
                Ok(WebhookAck {
                    received: true,
                    outcome: WebhookOutcome::PaymentFailed,
                    reference: Some(reference),
                    order_group_id: None,
                })
            }
            PaymentEvent::Other(kind) => {
                info!(event = %kind, "ignoring webhook event");
                Ok(WebhookAck::ignored())
            }
        }
    }
}

fn parse_json(payload: &[u8]) -> Result<Value, ServiceError> {
    serde_json::from_slice(payload)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid webhook payload: {}", e)))
}

/// Build a valid `Stripe-Signature` header; used by tests and local tooling
pub fn sign_stripe_payload(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("Invalid webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Hex HMAC-SHA512 of `payload`, as Paystack sends it
pub fn sign_paystack_payload(secret: &str, payload: &[u8]) -> Result<String, ServiceError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("Invalid webhook secret".to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn stripe_signature_round_trips() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let header = sign_stripe_payload(SECRET, 1_700_000_000, body).unwrap();
        assert!(verify_stripe_signature(SECRET, &header, body, 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn stripe_rejects_stale_or_tampered() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let header = sign_stripe_payload(SECRET, 1_700_000_000, body).unwrap();
        assert_matches!(
            verify_stripe_signature(SECRET, &header, body, 300, 1_700_000_301),
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            verify_stripe_signature(SECRET, &header, b"{}", 300, 1_700_000_000),
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            verify_stripe_signature(SECRET, "v1=abcd", body, 300, 1_700_000_000),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn stripe_accepts_any_matching_v1() {
        let body = b"{}";
        let valid = sign_stripe_payload(SECRET, 10, body).unwrap();
        let v1 = valid.split_once("v1=").map(|(_, v)| v).unwrap();
        let header = format!("t=10,v1={},v1={}", "00".repeat(32), v1);
        assert!(verify_stripe_signature(SECRET, &header, body, 300, 10).is_ok());
    }

    #[test]
    fn paystack_signature_is_sha512_of_body() {
        let body = br#"{"event":"charge.success"}"#;
        let sig = sign_paystack_payload("sk_test_123", body).unwrap();
        assert_eq!(sig.len(), 128);
        assert!(verify_paystack_signature("sk_test_123", &sig, body).is_ok());
        assert!(verify_paystack_signature("sk_test_other", &sig, body).is_err());
    }

    #[test]
    fn stripe_events_resolve_reference() {
        let event = json!({
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_1", "client_reference_id": "CS-ABC", "payment_intent": "pi_9" } }
        });
        assert_eq!(
            parse_stripe_event(&event).unwrap(),
            PaymentEvent::Succeeded {
                reference: "CS-ABC".into(),
                payment_reference: Some("pi_9".into())
            }
        );

        let metadata_wins = json!({
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1", "metadata": { "reference": "CS-META" }, "client_reference_id": "CS-OTHER" } }
        });
        assert_matches!(
            parse_stripe_event(&metadata_wins).unwrap(),
            PaymentEvent::Succeeded { reference, .. } if reference == "CS-META"
        );
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let event = json!({ "type": "customer.created", "data": { "object": {} } });
        assert_matches!(parse_stripe_event(&event).unwrap(), PaymentEvent::Other(_));
        let event = json!({ "event": "transfer.success", "data": {} });
        assert_matches!(parse_paystack_event(&event).unwrap(), PaymentEvent::Other(_));
    }

    #[test]
    fn paystack_success_without_reference_is_bad_request() {
        let event = json!({ "event": "charge.success", "data": { "id": 42 } });
        assert_matches!(parse_paystack_event(&event), Err(ServiceError::BadRequest(_)));
    }
}
