// ABOUTME: OAuth handshake module for both protocol generations
// ABOUTME: Includes request signing, token exchangers, and authorize URL construction

pub mod authorize;
pub(crate) mod consumed;
pub mod exchanger;
pub mod oauth1;
pub mod oauth2;
pub mod signing;

pub use authorize::AuthorizeUrlBuilder;
pub use exchanger::{build_http_client, exchanger_for, TokenExchanger};
pub use oauth1::OAuth1Exchanger;
pub use oauth2::OAuth2Exchanger;
pub use signing::OAuth1Signer;
