// ABOUTME: Operations a connected Gowalla member's client exposes
// ABOUTME: Kept as a trait so callers can stub the API in their own tests

use async_trait::async_trait;
use tether_connect::ConnectResult;

/// Gowalla API calls on behalf of the member the access token was issued to
#[async_trait]
pub trait GowallaOperations: Send + Sync {
    /// The member's Gowalla username
    async fn profile_id(&self) -> ConnectResult<String>;

    /// Link to the member's public profile page
    async fn profile_url(&self) -> ConnectResult<String>;
}
