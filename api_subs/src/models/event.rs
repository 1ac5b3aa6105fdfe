use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use common::error::{AppError, Res};
use serde::{Deserialize, Deserializer};

/// Provider event, decoded at the ingress boundary. One variant per handled
/// event type; everything else lands in `Unhandled`.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted(CheckoutCompleted),
    SubscriptionUpdated(SubscriptionChanged),
    SubscriptionDeleted(SubscriptionChanged),
    InvoicePaymentSucceeded(InvoiceSettled),
    InvoicePaymentFailed(InvoiceSettled),
    Unhandled(String),
}

impl WebhookEvent {
    pub fn kind(&self) -> &str {
        match self {
            WebhookEvent::CheckoutCompleted(_) => "checkout.session.completed",
            WebhookEvent::SubscriptionUpdated(_) => "customer.subscription.updated",
            WebhookEvent::SubscriptionDeleted(_) => "customer.subscription.deleted",
            WebhookEvent::InvoicePaymentSucceeded(_) => "invoice.payment_succeeded",
            WebhookEvent::InvoicePaymentFailed(_) => "invoice.payment_failed",
            WebhookEvent::Unhandled(kind) => kind,
        }
    }

    /// Decodes a verified event body. A handled type whose object does not
    /// have the expected shape is a client error.
    pub fn from_slice(payload: &[u8]) -> Res<Self> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

        log::debug!("Decoding webhook event {} ({})", raw.id, raw.event_type);

        let object = raw.data.object;
        let event = match raw.event_type.as_str() {
            "checkout.session.completed" => Self::CheckoutCompleted(decode(object)?),
            "customer.subscription.updated" => Self::SubscriptionUpdated(decode(object)?),
            "customer.subscription.deleted" => Self::SubscriptionDeleted(decode(object)?),
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded(decode(object)?),
            "invoice.payment_failed" => Self::InvoicePaymentFailed(decode(object)?),
            _ => Self::Unhandled(raw.event_type),
        };
        Ok(event)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutCompleted {
    pub id: String,
    pub mode: String,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default, deserialize_with = "object_id")]
    pub subscription: Option<String>,
    #[serde(default, deserialize_with = "object_id")]
    pub customer: Option<String>,
}

impl CheckoutCompleted {
    pub fn is_subscription(&self) -> bool {
        self.mode == "subscription"
    }

    /// The user the session was opened for.
    pub fn user_reference(&self) -> Option<&str> {
        self.client_reference_id
            .as_deref()
            .or_else(|| self.metadata.get("userId").map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionChanged {
    pub id: String,
    pub status: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: Option<bool>,
}

impl SubscriptionChanged {
    pub fn period_start(&self) -> Option<DateTime<Utc>> {
        self.current_period_start.and_then(to_datetime)
    }

    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end.and_then(to_datetime)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvoiceSettled {
    pub id: String,
    #[serde(default, deserialize_with = "object_id")]
    pub subscription: Option<String>,
    #[serde(default, deserialize_with = "object_id")]
    pub payment_intent: Option<String>,
    #[serde(default, deserialize_with = "object_id")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
}

fn to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

fn decode<T: serde::de::DeserializeOwned>(object: serde_json::Value) -> Res<T> {
    serde_json::from_value(object)
        .map_err(|e| AppError::BadRequest(format!("Malformed webhook object: {}", e)))
}

/// Provider references arrive either as a bare id or as an expanded object.
fn object_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Reference {
        Id(String),
        Object { id: String },
    }

    Ok(Option::<Reference>::deserialize(deserializer)?.map(|r| match r {
        Reference::Id(id) | Reference::Object { id } => id,
    }))
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(event_type: &str, object: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_700_000_000,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn decodes_checkout_with_expanded_references() {
        let payload = body(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "subscription",
                "client_reference_id": null,
                "metadata": { "userId": "u-1" },
                "subscription": { "id": "sub_123", "object": "subscription" },
                "customer": "cus_9"
            }),
        );
        let WebhookEvent::CheckoutCompleted(session) = WebhookEvent::from_slice(&payload).unwrap()
        else {
            panic!("expected checkout event");
        };
        assert_eq!(session.subscription.as_deref(), Some("sub_123"));
        assert_eq!(session.customer.as_deref(), Some("cus_9"));
        assert_eq!(session.user_reference(), Some("u-1"));
        assert!(session.is_subscription());
    }

    #[test]
    fn unknown_types_are_unhandled() {
        let payload = body("charge.refunded", json!({ "id": "ch_1" }));
        assert_eq!(
            WebhookEvent::from_slice(&payload).unwrap(),
            WebhookEvent::Unhandled("charge.refunded".into())
        );
    }

    #[test]
    fn malformed_handled_object_is_bad_request() {
        let payload = body("invoice.payment_failed", json!({ "id": "in_1" }));
        assert!(matches!(
            WebhookEvent::from_slice(&payload),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn subscription_period_converts_to_utc() {
        let payload = body(
            "customer.subscription.updated",
            json!({
                "id": "sub_123",
                "status": "past_due",
                "current_period_end": 1_700_000_000,
                "cancel_at_period_end": false
            }),
        );
        let WebhookEvent::SubscriptionUpdated(sub) = WebhookEvent::from_slice(&payload).unwrap()
        else {
            panic!("expected subscription event");
        };
        assert_eq!(sub.period_end().unwrap().timestamp(), 1_700_000_000);
        assert!(sub.period_start().is_none());
    }
}
