// ABOUTME: Gowalla binding for Tether connections
// ABOUTME: Provides the typed Gowalla client and a preconfigured OAuth 2.0 provider

pub mod client;
pub mod operations;
pub mod provider;

pub use client::{GowallaClient, GowallaProfile};
pub use operations::GowallaOperations;
pub use provider::{
    gowalla_config, gowalla_config_with_base, gowalla_service_provider, GowallaClientFactory,
    GowallaProfileResolver,
};
