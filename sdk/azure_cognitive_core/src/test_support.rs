//! Helpers for testing service crates against a mock server.

use crate::auth::ServiceCredential;
use crate::client::ServiceClient;
use wiremock::MockServer;

/// Test subscription key (not a real key).
pub const TEST_SUBSCRIPTION_KEY: &str = "test-subscription-key";

/// A dispatcher pointed at `server`, authenticated with [`TEST_SUBSCRIPTION_KEY`].
pub fn mock_service_client(server: &MockServer) -> ServiceClient {
    ServiceClient::builder()
        .base_url(server.uri())
        .credential(ServiceCredential::subscription_key(TEST_SUBSCRIPTION_KEY))
        .build()
        .expect("should build mock client")
}

/// A Cognitive Services JSON error body.
pub fn json_error(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// A storage XML error body.
pub fn xml_error(code: &str, message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>{code}</Code><Message>{message}</Message></Error>"
    )
}
