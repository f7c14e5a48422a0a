use std::sync::Arc;

use crate::{
    infra::{config::AppConfig, rate_limit::RateLimiterTrait, webhook_signature::SignatureVerifier},
    use_cases::{
        payment_status::PaymentStatusService, reconcile::PaymentReconciler,
        recovery::PaymentRecovery,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub reconciler: Arc<PaymentReconciler>,
    pub payment_status: Arc<PaymentStatusService>,
    pub recovery: Arc<PaymentRecovery>,
    pub signature_verifier: Arc<SignatureVerifier>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}
