pub mod config;
pub mod error;
pub mod observability;
pub mod plugin_selection;
pub mod router;
pub mod session;
pub mod sso_request;
pub mod state;
pub mod urls;

#[cfg(test)]
mod test_support;
