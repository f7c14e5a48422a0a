use serde::{Deserialize, Serialize};

/// Status of a checkout attempt awaiting gateway confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pending_payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PendingPaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PendingPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingPaymentStatus::Pending => "pending",
            PendingPaymentStatus::Completed => "completed",
            PendingPaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PendingPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
