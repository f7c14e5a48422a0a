use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::gateway_query::{GatewayQueryClient, GatewayTransaction},
};

const BILL_TRANSACTIONS_PATH: &str = "/index.php/api/getBillTransactions";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BillTransactionsRequest<'a> {
    user_secret_key: &'a str,
    bill_id: &'a str,
}

/// ToyyibPay transaction query API.
#[derive(Clone)]
pub struct ToyyibPayClient {
    client: Client,
    endpoint: String,
    secret_key: SecretString,
}

impl ToyyibPayClient {
    pub fn new(client: Client, base_url: &str, secret_key: SecretString) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), BILL_TRANSACTIONS_PATH),
            secret_key,
        }
    }
}

/// Keep the transactions from a list response. Anything that is not a list has none.
fn transactions_from_response(bill_id: &str, body: JsonValue) -> Vec<GatewayTransaction> {
    let JsonValue::Array(items) = body else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(tx) => Some(tx),
            Err(e) => {
                warn!(bill_id, error = %e, "Skipping unreadable gateway transaction");
                None
            }
        })
        .collect()
}

#[async_trait]
impl GatewayQueryClient for ToyyibPayClient {
    async fn get_bill_transactions(&self, bill_id: &str) -> AppResult<Vec<GatewayTransaction>> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&BillTransactionsRequest {
                user_secret_key: self.secret_key.expose_secret(),
                bill_id,
            })
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "gateway query returned {status}"
            )));
        }

        let body: JsonValue = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let transactions = transactions_from_response(bill_id, body);
        debug!(bill_id, count = transactions.len(), "Fetched bill transactions");
        Ok(transactions)
    }
}
