pub mod notification;
pub mod payment_status;
pub mod reconcile;
pub mod recovery;
