pub mod gateway_status;
pub mod payment_status;
pub mod pending_payment_status;
