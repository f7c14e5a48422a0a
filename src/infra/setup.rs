use crate::{
    adapters::{
        gateway::ToyyibPayClient, http::app_state::AppState,
        subscription::HttpSubscriptionExtender,
    },
    infra::{
        RateLimiterTrait,
        config::AppConfig,
        http_client::build_client,
        postgres_persistence,
        rate_limit::{FixedWindowRateLimiter, RedisRateLimiter},
        webhook_signature::SignatureVerifier,
    },
    use_cases::{
        notification::{NotificationEmitter, NotificationRepo},
        payment_status::PaymentStatusService,
        reconcile::{PaymentReconciler, PendingPaymentRepo, WebhookEventRepo},
        recovery::PaymentRecovery,
    },
};
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let http_client = build_client()?;

    let rate_limiter: Arc<dyn RateLimiterTrait> = match &config.redis_url {
        Some(redis_url) => {
            info!("Using Redis rate limiter");
            Arc::new(
                RedisRateLimiter::new(
                    redis_url,
                    config.rate_limit_window_secs,
                    config.rate_limit_max_requests,
                )
                .await?,
            )
        }
        None => {
            warn!("REDIS_URL not set, rate limiting is per process");
            Arc::new(FixedWindowRateLimiter::new(
                Duration::from_secs(config.rate_limit_window_secs),
                config.rate_limit_max_requests,
            ))
        }
    };

    let extender = Arc::new(HttpSubscriptionExtender::new(
        http_client.clone(),
        config.extend_subscription_url.to_string(),
        config.service_role_key.clone(),
    ));

    info!(
        api_url = %config.toyyibpay_api_url,
        category_code = %config.toyyibpay_category_code,
        "Gateway client configured"
    );
    let gateway = Arc::new(ToyyibPayClient::new(
        http_client,
        config.toyyibpay_api_url.as_str(),
        config.toyyibpay_secret_key.clone(),
    ));

    let notifications = NotificationEmitter::new(
        postgres_arc.clone() as Arc<dyn NotificationRepo>,
        config.notification_ttl,
    );

    let reconciler = Arc::new(PaymentReconciler::new(
        postgres_arc.clone() as Arc<dyn PendingPaymentRepo>,
        postgres_arc.clone() as Arc<dyn WebhookEventRepo>,
        extender,
        notifications,
    ));

    let payment_status = PaymentStatusService::new(gateway);
    let recovery = PaymentRecovery::new(payment_status.clone(), reconciler.clone());

    if config.webhook_accept_get {
        warn!("GET callbacks enabled; only signed queries are accepted");
    }

    let signature_verifier = SignatureVerifier::new(config.toyyibpay_webhook_secret.clone());

    Ok(AppState {
        config: Arc::new(config),
        reconciler,
        payment_status: Arc::new(payment_status),
        recovery: Arc::new(recovery),
        signature_verifier: Arc::new(signature_verifier),
        rate_limiter,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "payment_reconciler=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs), skipped when the file cannot be created
    let json_layer = File::create("app.log").ok().map(|file| {
        fmt::layer()
            .json()
            .with_writer(file)
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
