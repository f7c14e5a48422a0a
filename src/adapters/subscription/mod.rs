use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::subscription_extender::{
        ExtensionRequest, ExtensionResult, SubscriptionExtender,
    },
};

/// Calls the subscription extension endpoint with the service credential.
#[derive(Clone)]
pub struct HttpSubscriptionExtender {
    client: Client,
    url: String,
    service_key: SecretString,
}

impl HttpSubscriptionExtender {
    pub fn new(client: Client, url: String, service_key: SecretString) -> Self {
        Self {
            client,
            url,
            service_key,
        }
    }
}

#[async_trait]
impl SubscriptionExtender for HttpSubscriptionExtender {
    async fn extend(&self, request: &ExtensionRequest) -> AppResult<ExtensionResult> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(self.service_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "extend-subscription returned {status}: {body}"
            )));
        }

        resp.json::<ExtensionResult>()
            .await
            .map_err(|e| AppError::Upstream(format!("malformed extension response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::subscription_extender::{ExtensionPaymentData, PaymentSource};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn request_body_matches_endpoint_contract() {
        let user_id = Uuid::new_v4();
        let body = serde_json::to_value(ExtensionRequest {
            user_id,
            plan_id: "premium_1m".into(),
            payment_data: ExtensionPaymentData {
                transaction_id: "T1".into(),
                amount: 50.0,
                bill_id: "B123".into(),
                status: "1".into(),
                source: PaymentSource::Webhook,
            },
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "userId": user_id,
                "planId": "premium_1m",
                "paymentData": {
                    "transactionId": "T1",
                    "amount": 50.0,
                    "billId": "B123",
                    "status": "1",
                    "source": "webhook"
                }
            })
        );
    }

    #[test]
    fn result_tolerates_missing_fields() {
        let result: ExtensionResult =
            serde_json::from_value(json!({ "newSubscriptionId": "sub_9" })).unwrap();
        assert_eq!(result.new_subscription_id.as_deref(), Some("sub_9"));
        assert_eq!(result.days_added, 0);
    }
}
