pub mod gateway;
pub mod http;
pub mod persistence;
pub mod subscription;
