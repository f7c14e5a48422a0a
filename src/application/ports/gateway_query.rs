use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::{app_error::AppResult, domain::entities::gateway_status::GatewayStatusCode};

/// One entry of the gateway's bill transaction list.
///
/// Amounts and dates come back as strings or numbers depending on the gateway
/// version, so every scalar is read leniently into a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    #[serde(rename = "billpaymentStatus", default)]
    pub billpayment_status: Option<GatewayStatusCode>,
    #[serde(rename = "billAmount", default, deserialize_with = "lenient_string")]
    pub bill_amount: Option<String>,
    #[serde(rename = "billpaymentDate", default, deserialize_with = "lenient_string")]
    pub billpayment_date: Option<String>,
    #[serde(rename = "billpaymentInvoiceNo", default, deserialize_with = "lenient_string")]
    pub billpayment_invoice_no: Option<String>,
    #[serde(rename = "billpaidAmount", default, deserialize_with = "lenient_string")]
    pub billpaid_amount: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(JsonValue::String(s)) if !s.is_empty() => Some(s),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Read-only access to the gateway's transaction query API.
#[async_trait]
pub trait GatewayQueryClient: Send + Sync {
    /// Transactions recorded for `bill_id`, most authoritative first. Empty when the
    /// gateway has none or answered with something other than a list.
    async fn get_bill_transactions(&self, bill_id: &str) -> AppResult<Vec<GatewayTransaction>>;
}
