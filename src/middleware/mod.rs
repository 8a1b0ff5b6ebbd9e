pub mod auth_context;
pub mod device_context;
