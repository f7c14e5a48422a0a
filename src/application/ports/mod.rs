pub mod gateway_query;
pub mod subscription_extender;
