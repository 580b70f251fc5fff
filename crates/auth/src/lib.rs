pub mod authorization_api;
pub mod cookie_signature;
pub mod data_model;
pub mod plugin_registry;
pub mod session_store;
