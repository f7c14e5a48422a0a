use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_error::AppResult;

/// Where a completion came from. Carried to the extension endpoint and into notification metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    Webhook,
    Recovery,
}

impl PaymentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSource::Webhook => "webhook",
            PaymentSource::Recovery => "recovery",
        }
    }
}

impl std::fmt::Display for PaymentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionPaymentData {
    pub transaction_id: String,
    /// Decimal amount, e.g. `50.0` for RM50.
    pub amount: f64,
    pub bill_id: String,
    pub status: String,
    pub source: PaymentSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRequest {
    pub user_id: Uuid,
    pub plan_id: String,
    pub payment_data: ExtensionPaymentData,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionResult {
    #[serde(default)]
    pub new_subscription_id: Option<String>,
    #[serde(default)]
    pub days_added: i64,
}

/// Computes and persists the new subscription period for a completed payment.
#[async_trait]
pub trait SubscriptionExtender: Send + Sync {
    async fn extend(&self, request: &ExtensionRequest) -> AppResult<ExtensionResult>;
}
