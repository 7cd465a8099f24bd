use std::time::Duration;

use idtoolkit::ClientConfig;
use idtoolkit::IdentityClient;
use idtoolkit::OobRequest;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example 1: Configuration file
    println!("=== Example 1: Configuration File ===");
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "gitkit-server-config.json".to_string());

    let config = match ClientConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Could not load {config_path}: {e}");
            // Fall back to a config that can only verify tokens
            ClientConfig::new("https://example.com/widget", "my-project")?
        }
    };

    let client = IdentityClient::new(config)?;

    // Example token (this is just a placeholder - use a real token in practice)
    let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6...";

    match client.verify_user(token).await {
        Ok(user) => {
            println!("✓ Token verified successfully!");
            println!("  User ID: {}", user.user_id);
            println!("  Email: {:?}", user.email);
        }
        Err(e) => {
            eprintln!("✗ Token verification failed: {}", e);
        }
    }

    println!();

    // Example 2: Custom HTTP client and out-of-band link
    println!("=== Example 2: Password Reset Link ===");
    let custom_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let config = ClientConfig::new("https://example.com/widget", "my-project")?
        .with_server_api_key("your-server-api-key")
        .with_http_client(custom_client);
    let client = IdentityClient::new(config)?;

    let response = client
        .get_oob_result(&OobRequest::reset_password("user@example.com"))
        .await;

    match response.result() {
        Some(result) => println!("✓ Reset link: {}", result.oob_link),
        None => eprintln!("✗ Reset failed: {}", response.response_body()),
    }

    Ok(())
}
