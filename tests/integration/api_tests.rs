//! API integration tests
//!
//! Run against a server started on a fresh database:
//! `cargo test --test api_tests -- --ignored`

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

const LIBRARIAN_EMAIL: &str = "head.librarian@aust.edu";
const LIBRARIAN_PASSWORD: &str = "Library#2024";

/// Short unique suffix so repeated runs do not collide on ids and emails
fn unique() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("{:x}", nanos % 0xffff_ffff)
}

async fn login(client: &Client, email: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request")
}

async fn token_of(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Log in as the head librarian, registering it on a fresh database
async fn librarian_token(client: &Client) -> String {
    let response = login(client, LIBRARIAN_EMAIL, LIBRARIAN_PASSWORD).await;
    if response.status().is_success() {
        return token_of(response).await;
    }

    let response = client
        .post(format!("{}/accounts/librarians", BASE_URL))
        .json(&json!({
            "librarian_id": "LIB-0001",
            "name": "Head Librarian",
            "designation": "Chief Librarian",
            "email": LIBRARIAN_EMAIL,
            "password": LIBRARIAN_PASSWORD
        }))
        .send()
        .await
        .expect("Failed to register librarian");
    assert_eq!(response.status(), StatusCode::CREATED);

    token_of(login(client, LIBRARIAN_EMAIL, LIBRARIAN_PASSWORD).await).await
}

/// Register a fresh student and return its token
async fn student_token(client: &Client) -> String {
    let suffix = unique();
    let email = format!("student.{}@aust.edu", suffix);
    let response = client
        .post(format!("{}/accounts/students", BASE_URL))
        .json(&json!({
            "student_id": format!("S-{}", suffix),
            "name": "Test Student",
            "department": "CSE",
            "email": email,
            "password": "Secret#123"
        }))
        .send()
        .await
        .expect("Failed to register student");
    assert_eq!(response.status(), StatusCode::CREATED);

    token_of(login(client, &email, "Secret#123").await).await
}

async fn create_publication(client: &Client, token: &str, copies: i32) -> i64 {
    let response = client
        .post(format!("{}/publications", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": format!("Compilers {}", unique()),
            "author": "A. Aho",
            "type": "book",
            "department": "CSE",
            "total_copies": copies
        }))
        .send()
        .await
        .expect("Failed to create publication");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], copies);
    body["id"].as_i64().expect("No id in response")
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
async fn test_readiness_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = login(&client, LIBRARIAN_EMAIL, "wrong").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_registration_outside_domain_rejected() {
    let client = Client::new();
    let suffix = unique();

    let response = client
        .post(format!("{}/accounts/students", BASE_URL))
        .json(&json!({
            "student_id": format!("S-{}", suffix),
            "name": "Outsider",
            "department": "CSE",
            "email": format!("outsider.{}@gmail.com", suffix),
            "password": "Secret#123"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_get_current_user() {
    let client = Client::new();
    let token = librarian_token(&client).await;

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], LIBRARIAN_EMAIL);
    assert_eq!(body["role"], "librarian");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/loans/mine", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_student_cannot_manage_catalog() {
    let client = Client::new();
    let token = student_token(&client).await;

    let response = client
        .post(format!("{}/publications", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "title": "Forbidden", "author": "Nobody", "type": "book" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_only_librarians_list_students() {
    let client = Client::new();
    let student = student_token(&client).await;
    let librarian = librarian_token(&client).await;

    let response = client
        .get(format!("{}/accounts/students", BASE_URL))
        .bearer_auth(&student)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .get(format!("{}/accounts/students", BASE_URL))
        .bearer_auth(&librarian)
        .send()
        .await
        .expect("Failed to list students");
    assert!(response.status().is_success());
    let students: Value = response.json().await.expect("Failed to parse students");
    let students = students.as_array().expect("Expected an array");
    assert!(!students.is_empty());
    assert!(students.iter().all(|s| s["role"] == "student"));
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return_last_copy() {
    let client = Client::new();
    let librarian = librarian_token(&client).await;
    let alice = student_token(&client).await;
    let bashir = student_token(&client).await;
    let publication_id = create_publication(&client, &librarian, 1).await;

    let response = client
        .post(format!("{}/publications/{}/borrow", BASE_URL, publication_id))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("Failed to borrow");
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    assert_eq!(loan["status"], "borrowed");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    let response = client
        .post(format!("{}/publications/{}/borrow", BASE_URL, publication_id))
        .bearer_auth(&bashir)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "NotAvailable");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("Failed to return");
    assert!(response.status().is_success());
    let receipt: Value = response.json().await.expect("Failed to parse receipt");
    assert_eq!(receipt["loan"]["status"], "returned");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("{}/publications/{}", BASE_URL, publication_id))
        .send()
        .await
        .expect("Failed to fetch publication");
    let publication: Value = response.json().await.expect("Failed to parse publication");
    assert_eq!(publication["available_copies"], 1);
}

#[tokio::test]
#[ignore]
async fn test_librarian_extends_and_lists_loans() {
    let client = Client::new();
    let librarian = librarian_token(&client).await;
    let student = student_token(&client).await;
    let publication_id = create_publication(&client, &librarian, 2).await;

    let loan: Value = client
        .post(format!("{}/publications/{}/borrow", BASE_URL, publication_id))
        .bearer_auth(&student)
        .send()
        .await
        .expect("Failed to borrow")
        .json()
        .await
        .expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    let response = client
        .post(format!("{}/loans/{}/extend", BASE_URL, loan_id))
        .bearer_auth(&librarian)
        .json(&json!({ "days": 31 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/loans/{}/extend", BASE_URL, loan_id))
        .bearer_auth(&librarian)
        .json(&json!({ "days": 7 }))
        .send()
        .await
        .expect("Failed to extend");
    assert!(response.status().is_success());
    let extension: Value = response.json().await.expect("Failed to parse extension");
    assert_eq!(extension["extended_by_days"], 7);
    assert_eq!(extension["loan"]["status"], "borrowed");

    let response = client
        .get(format!("{}/loans?status=borrowed", BASE_URL))
        .bearer_auth(&librarian)
        .send()
        .await
        .expect("Failed to list loans");
    assert!(response.status().is_success());
    let loans: Value = response.json().await.expect("Failed to parse loans");
    assert!(loans
        .as_array()
        .expect("Expected an array")
        .iter()
        .any(|l| l["id"] == loan_id));

    let response = client
        .get(format!("{}/loans/stats", BASE_URL))
        .bearer_auth(&student)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .post(format!("{}/loans/{}/manual-return", BASE_URL, loan_id))
        .bearer_auth(&librarian)
        .send()
        .await
        .expect("Failed to return");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_openapi_document() {
    let client = Client::new();

    let response = client
        .get("http://localhost:8080/api-docs/openapi.json")
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["paths"]["/publications/{id}/borrow"].is_object());
}
