//! End-to-end tests for the HTTP API.
//!
//! Each test starts a real Axum server on a random port backed by the
//! in-memory store and drives it with reqwest:
//! - slot listing, booking, double-booking, and past bookings
//! - cancellation freeing the hour
//! - reviews and the rating summary

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{Value, json};

use counsel_desk::config::BookingConfig;
use counsel_desk::db::Database;
use counsel_desk::db::memory::InMemoryBackend;
use counsel_desk::web::{AppState, start_server};

async fn start_test_server() -> (SocketAddr, Arc<AppState>) {
    let backend = InMemoryBackend::new();
    backend.run_migrations().await.expect("migrations");
    let state = Arc::new(AppState::new(Arc::new(backend), BookingConfig::default()));
    let addr = start_server("127.0.0.1:0".parse().expect("addr"), Arc::clone(&state))
        .await
        .expect("server should start");
    (addr, state)
}

async fn register_attorney(client: &reqwest::Client, base: &str, email: &str) -> String {
    let response = client
        .post(format!("{base}/api/attorneys"))
        .json(&json!({
            "full_name": "Riley Chen",
            "email": email,
            "bar_association_id": format!("BAR-{email}"),
            "practice_areas": ["Family Law"],
            "hourly_rate": "240",
            "fixed_fee_packages": [{"name": "Will", "price": "500"}],
            "location": {"city": "Denver", "state": "CO", "country": "USA"},
            "timezone": "-07:00",
        }))
        .send()
        .await
        .expect("register request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("json");
    body["id"].as_str().expect("attorney id").to_string()
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let (addr, state) = start_test_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();
    let attorney_id = register_attorney(&client, &base, "riley@firm.test").await;

    // 10:00 in the attorney's -07:00 zone, a week out.
    let day = (Utc::now() + Duration::days(7)).date_naive();
    let local_ten = day.and_hms_opt(17, 0, 0).expect("time").and_utc();

    let slots: Value = client
        .get(format!("{base}/api/attorneys/{attorney_id}/slots?date={day}"))
        .send()
        .await
        .expect("slots")
        .json()
        .await
        .expect("json");
    assert_eq!(slots["slots"].as_array().expect("slots").len(), 8);

    let booking = json!({
        "attorney_id": attorney_id,
        "client_name": "Sam Ortiz",
        "client_email": "sam@example.test",
        "scheduled_at": local_ten,
        "duration": 90,
        "consultation_type": "hourly",
    });
    let response = client
        .post(format!("{base}/api/consultations"))
        .json(&booking)
        .send()
        .await
        .expect("book");
    assert_eq!(response.status(), StatusCode::CREATED);
    let receipt: Value = response.json().await.expect("json");
    assert_eq!(receipt["success"], true);
    let consultation_id = receipt["id"].as_str().expect("id").to_string();

    let consultation: Value = client
        .get(format!("{base}/api/consultations/{consultation_id}"))
        .send()
        .await
        .expect("get")
        .json()
        .await
        .expect("json");
    assert_eq!(consultation["status"], "pending");
    let price: f64 = consultation["price"]
        .as_str()
        .and_then(|p| p.parse().ok())
        .expect("decimal price");
    assert_eq!(price, 360.0);

    let response = client
        .post(format!("{base}/api/consultations"))
        .json(&booking)
        .send()
        .await
        .expect("double book");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        response.text().await.expect("text"),
        "This time slot is already booked"
    );

    let slots: Value = client
        .get(format!("{base}/api/attorneys/{attorney_id}/slots?date={day}"))
        .send()
        .await
        .expect("slots")
        .json()
        .await
        .expect("json");
    let times: Vec<&str> = slots["slots"]
        .as_array()
        .expect("slots")
        .iter()
        .filter_map(|slot| slot["time"].as_str())
        .collect();
    assert!(!times.contains(&"10:00"));
    assert_eq!(times.len(), 7);

    let mut past = booking.clone();
    past["scheduled_at"] = json!(Utc::now() - Duration::hours(2));
    let response = client
        .post(format!("{base}/api/consultations"))
        .json(&past)
        .send()
        .await
        .expect("past booking");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let upcoming: Value = client
        .get(format!(
            "{base}/api/attorneys/{attorney_id}/consultations/upcoming?days=30"
        ))
        .send()
        .await
        .expect("upcoming")
        .json()
        .await
        .expect("json");
    let upcoming = upcoming.as_array().expect("array");
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0]["client_name"], "Sam Ortiz");

    let response = client
        .post(format!("{base}/api/consultations/{consultation_id}/cancel"))
        .send()
        .await
        .expect("cancel");
    assert_eq!(response.status(), StatusCode::OK);

    // The freed hour can be booked again.
    let response = client
        .post(format!("{base}/api/consultations"))
        .json(&booking)
        .send()
        .await
        .expect("rebook");
    assert_eq!(response.status(), StatusCode::CREATED);

    state.shutdown().await;
}

#[tokio::test]
async fn reviews_and_rating_over_http() {
    let (addr, state) = start_test_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();
    let attorney_id = register_attorney(&client, &base, "reviews@firm.test").await;

    for (email, rating) in [("a@example.test", 5), ("b@example.test", 4)] {
        let response = client
            .post(format!("{base}/api/attorneys/{attorney_id}/reviews"))
            .json(&json!({
                "client_name": "Reviewer",
                "client_email": email,
                "rating": rating,
                "comment": "Clear and thorough advice.",
            }))
            .send()
            .await
            .expect("review");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = client
        .post(format!("{base}/api/attorneys/{attorney_id}/reviews"))
        .json(&json!({
            "client_name": "Reviewer",
            "client_email": "c@example.test",
            "rating": 6,
            "comment": "Out of range rating.",
        }))
        .send()
        .await
        .expect("bad review");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let rating: Value = client
        .get(format!("{base}/api/attorneys/{attorney_id}/rating"))
        .send()
        .await
        .expect("rating")
        .json()
        .await
        .expect("json");
    assert_eq!(rating, json!({"average_rating": 4.5, "total_reviews": 2}));

    let mine: Value = client
        .get(format!("{base}/api/reviews?client_email=a@example.test"))
        .send()
        .await
        .expect("by email")
        .json()
        .await
        .expect("json");
    assert_eq!(mine.as_array().expect("array").len(), 1);

    state.shutdown().await;
}

#[tokio::test]
async fn unknown_routes_and_ids() {
    let (addr, state) = start_test_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .expect("health")
        .json()
        .await
        .expect("json");
    assert_eq!(health["service"], "counsel-desk");

    let response = client
        .get(format!("{base}/api/consultations/{}", uuid::Uuid::new_v4()))
        .send()
        .await
        .expect("missing");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("{base}/api/matters/not-an-id"))
        .send()
        .await
        .expect("bad id");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    state.shutdown().await;
}
