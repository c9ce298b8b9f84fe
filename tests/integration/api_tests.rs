//! API integration tests
//!
//! Expect a running server with a bootstrap administrator configured as
//! admin@bookrent.local / admin-password.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:5000/api/v1";

/// Log in and return the bearer token
async fn get_auth_token(client: &Client, email: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": email,
            "password": password
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn admin_token(client: &Client) -> String {
    get_auth_token(client, "admin@bookrent.local", "admin-password").await
}

/// Register a fresh patron and return its token and id
async fn register_patron(client: &Client) -> (String, i64) {
    let email = format!("patron-{}@example.org", chrono::Utc::now().timestamp_micros());
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "name": "Integration Patron",
            "email": email,
            "password": "secret-password"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse response");
    (
        body["token"].as_str().expect("No token").to_string(),
        body["user"]["id"].as_i64().expect("No user id"),
    )
}

/// Create a book with one copy and return its id
async fn create_book(client: &Client, token: &str) -> i64 {
    let isbn = format!("978{}", chrono::Utc::now().timestamp_micros() % 10_000_000_000);
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": "Integration Test Book",
            "author": "Test Author",
            "isbn": isbn,
            "category": "Testing",
            "total_quantity": 1
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No book id")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": "admin@bookrent.local",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_register_and_profile() {
    let client = Client::new();
    let (token, user_id) = register_patron(&client).await;

    let response = client
        .get(format!("{}/users/profile", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["id"], user_id);
    assert_eq!(body["is_member"], false);
    assert_eq!(body["account_status"], "active");
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/transactions/my", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_patron_cannot_manage_books() {
    let client = Client::new();
    let (token, _) = register_patron(&client).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Forbidden",
            "author": "Nobody",
            "isbn": "0000000000",
            "category": "None"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_rent_requires_membership() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = create_book(&client, &admin).await;
    let (token, _) = register_patron(&client).await;

    let response = client
        .post(format!("{}/transactions/rent", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_rent_and_return_cycle() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = create_book(&client, &admin).await;
    let (token, _) = register_patron(&client).await;

    let response = client
        .post(format!("{}/users/membership", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "full_name": "Integration Patron",
            "address": "1 Library Lane",
            "city": "Springfield"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/transactions/rent", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "book_id": book_id, "rental_duration": 7 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let rental: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(rental["status"], "issued");
    assert_eq!(rental["delivery_address"], "1 Library Lane, Springfield");

    // The only copy is out
    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["available_quantity"], 0);

    let response = client
        .post(format!("{}/transactions/return", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["status"], "returned");

    let fines: Value = client
        .get(format!("{}/fines", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(fines["account_blocked"], false);
    assert!(fines["unpaid_fines"].as_array().expect("unpaid_fines").is_empty());
}

#[tokio::test]
#[ignore]
async fn test_admin_block_and_unblock() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = create_book(&client, &admin).await;
    let (token, user_id) = register_patron(&client).await;

    let response = client
        .put(format!("{}/admin/users/{}/block", BASE_URL, user_id))
        .bearer_auth(&admin)
        .json(&json!({ "reason": "Integration test" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["account_status"], "blocked");
    assert_eq!(body["account_block_reason"], "Integration test");

    let response = client
        .post(format!("{}/transactions/rent", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "AccountBlocked");
    assert_eq!(body["message"], "Integration test");

    let response = client
        .put(format!("{}/admin/users/{}/unblock", BASE_URL, user_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["account_status"], "active");
}

#[tokio::test]
#[ignore]
async fn test_run_fine_job() {
    let client = Client::new();
    let admin = admin_token(&client).await;

    let response = client
        .post(format!("{}/admin/fines/run", BASE_URL))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["overdue"].is_object());
    assert!(body["lost"].is_object());
    assert!(body["blocked"].is_object());
}

#[tokio::test]
#[ignore]
async fn test_fine_config_is_public() {
    let client = Client::new();
    let (token, _) = register_patron(&client).await;

    let response = client
        .get(format!("{}/fines/config", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["daily_fine_rate"].is_string());
}
