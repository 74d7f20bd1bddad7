use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use zerowaste_api::auth::seed_admin;
use zerowaste_api::{AppState, AppStateInner, router};
use zerowaste_db::Database;
use zerowaste_db::models::format_timestamp;

fn app() -> (Router, AppState) {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "integration-test-secret".into(),
        token_ttl: Duration::days(1),
    });
    (router(state.clone()), state)
}

/// Moves a donation's pickup deadline into the past without running the sweep.
fn make_overdue(state: &AppState, donation_id: &str) {
    let deadline = format_timestamp(Utc::now() - Duration::minutes(5));
    state
        .db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE donations SET pickup_deadline = ?1 WHERE id = ?2",
                [deadline.as_str(), donation_id],
            )?;
            Ok(())
        })
        .unwrap();
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn register(app: &Router, email: &str, role: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": "secret1",
            "confirm_password": "secret1",
            "first_name": "Test",
            "role": role,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

fn donation_body(food_type: &str, lat: f64, lng: f64, expires_in: Duration) -> Value {
    let now = Utc::now();
    json!({
        "title": "Surplus from lunch service",
        "food_details": {
            "type": food_type,
            "is_vegetarian": true,
            "quantity": 12.0,
            "quantity_unit": "kg",
            "expiry_date": now + expires_in,
        },
        "image_url": null,
        "location": {
            "latitude": lat,
            "longitude": lng,
            "city": "Hyderabad",
        },
        "pickup_deadline": now + Duration::hours(6),
    })
}

async fn create_donation(app: &Router, token: &str, body: Value) -> String {
    let (status, body) = send(app, Method::POST, "/donations", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn request_donation(app: &Router, token: &str, donation_id: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/donations/{}/requests", donation_id),
        Some(token),
        Some(json!({ "message": "We can collect this afternoon" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "pending");
    body["id"].as_str().unwrap().to_string()
}

async fn decide(app: &Router, token: &str, request_id: &str, outcome: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/requests/{}/decision", request_id),
        Some(token),
        Some(json!({ "status": outcome })),
    )
    .await
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn register_and_login() {
    let (app, _) = app();
    register(&app, "Donor@Example.org", "donor").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "donor@example.org", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "donor");
    let token = body["token"].as_str().unwrap();

    let (status, profile) = send(&app, Method::GET, "/profile", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "donor@example.org");
    assert_eq!(profile["is_verified"], false);

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "donor@example.org", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth");
}

#[tokio::test]
async fn registration_rules() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": "boss@example.org",
            "password": "secret1",
            "confirm_password": "secret1",
            "first_name": "Boss",
            "role": "admin",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": "r@example.org",
            "password": "secret1",
            "confirm_password": "secret2",
            "first_name": "R",
            "role": "receiver",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    register(&app, "r@example.org", "receiver").await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "email": "R@example.org",
            "password": "secret1",
            "confirm_password": "secret1",
            "first_name": "R",
            "role": "donor",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let (app, _) = app();
    let (status, body) = send(&app, Method::GET, "/donations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth");

    let (status, _) = send(&app, Method::GET, "/profile", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_keeps_role() {
    let (app, _) = app();
    let token = register(&app, "v@example.org", "volunteer").await;

    let (status, profile) = send(
        &app,
        Method::PATCH,
        "/profile",
        Some(&token),
        Some(json!({ "last_name": "Rao", "organization_name": "Food Bank" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["last_name"], "Rao");
    assert_eq!(profile["organization_name"], "Food Bank");
    assert_eq!(profile["role"], "volunteer");

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/profile",
        Some(&token),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert!(status.is_client_error());

    let (_, profile) = send(&app, Method::GET, "/profile", Some(&token), None).await;
    assert_eq!(profile["role"], "volunteer");
}

#[tokio::test]
async fn browse_filters_open_donations() {
    let (app, _) = app();
    let donor = register(&app, "donor@example.org", "donor").await;
    let receiver = register(&app, "receiver@example.org", "receiver").await;

    // ~1.1 km north of the viewer, five days of shelf life.
    let near = create_donation(
        &app,
        &donor,
        donation_body("Vegetables", 17.395, 78.4867, Duration::days(5)),
    )
    .await;
    // Same spot, expiring tomorrow.
    create_donation(
        &app,
        &donor,
        donation_body("Bakery", 17.395, 78.4867, Duration::days(1)),
    )
    .await;
    // Bengaluru, far outside the default radius.
    create_donation(
        &app,
        &donor,
        donation_body("Vegetables", 12.9716, 77.5946, Duration::days(5)),
    )
    .await;

    let viewer = "lat=17.385&lng=78.4867";

    let (status, list) = send(&app, Method::GET, &format!("/donations?{viewer}"), Some(&receiver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert!(list[0]["distance_km"].as_f64().unwrap() < 2.0);

    let (_, list) = send(
        &app,
        Method::GET,
        &format!("/donations?{viewer}&food_type=VEGETABLES&freshness=fresh"),
        Some(&receiver),
        None,
    )
    .await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], near.as_str());
    assert_eq!(list[0]["urgency"], "fresh");
    assert_eq!(list[0]["marker_color"], "#10B981");

    let (_, list) = send(
        &app,
        Method::GET,
        &format!("/donations?{viewer}&freshness=expiring"),
        Some(&receiver),
        None,
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["food_details"]["type"], "Bakery");

    let (_, list) = send(
        &app,
        Method::GET,
        &format!("/donations?{viewer}&max_distance_km=1000"),
        Some(&receiver),
        None,
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 3);

    // A zero radius turns the distance check off.
    let (_, list) = send(
        &app,
        Method::GET,
        &format!("/donations?{viewer}&max_distance_km=0"),
        Some(&receiver),
        None,
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 3);

    // No viewer position: the distance check is skipped.
    let (_, list) = send(&app, Method::GET, "/donations", Some(&receiver), None).await;
    assert_eq!(list.as_array().unwrap().len(), 3);
    assert!(list[0].get("distance_km").is_none());

    let (status, _) = send(&app, Method::GET, "/donations?lat=17.385", Some(&receiver), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_registrations_conflict_cleanly() {
    let (app, _) = app();
    let form = json!({
        "email": "twin@example.org",
        "password": "secret1",
        "confirm_password": "secret1",
        "first_name": "Twin",
        "role": "receiver",
    });

    let (a, b) = tokio::join!(
        send(&app, Method::POST, "/auth/register", None, Some(form.clone())),
        send(&app, Method::POST, "/auth/register", None, Some(form.clone())),
    );
    let mut statuses = [a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);

    let (status, _) = send(&app, Method::POST, "/auth/register", None, Some(form)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn overdue_donations_cannot_be_taken() {
    let (app, state) = app();
    let donor = register(&app, "donor@example.org", "donor").await;
    let receiver = register(&app, "receiver@example.org", "receiver").await;

    let requested = create_donation(
        &app,
        &donor,
        donation_body("Rice", 17.385, 78.4867, Duration::days(2)),
    )
    .await;
    let request = request_donation(&app, &receiver, &requested).await;
    let untouched = create_donation(
        &app,
        &donor,
        donation_body("Curry", 17.385, 78.4867, Duration::days(2)),
    )
    .await;

    // Both deadlines pass before the sweep gets to them.
    make_overdue(&state, &requested);
    make_overdue(&state, &untouched);

    let (_, open) = send(&app, Method::GET, "/donations", Some(&receiver), None).await;
    assert!(open.as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/donations/{}/requests", untouched),
        Some(&receiver),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = decide(&app, &donor, &request, "accepted").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, mine) = send(&app, Method::GET, "/requests/mine", Some(&receiver), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["status"], "pending");
    assert_eq!(mine[0]["donation"]["status"], "pending");
}

#[tokio::test]
async fn only_donors_list_food() {
    let (app, _) = app();
    let receiver = register(&app, "receiver@example.org", "receiver").await;
    let donor = register(&app, "donor@example.org", "donor").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/donations",
        Some(&receiver),
        Some(donation_body("Rice", 17.385, 78.4867, Duration::days(2))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let mut past_deadline = donation_body("Rice", 17.385, 78.4867, Duration::days(2));
    past_deadline["pickup_deadline"] = json!(Utc::now() - Duration::hours(1));
    let (status, _) = send(&app, Method::POST, "/donations", Some(&donor), Some(past_deadline)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_decision_flow() {
    let (app, _) = app();
    let donor = register(&app, "donor@example.org", "donor").await;
    let other_donor = register(&app, "other@example.org", "donor").await;
    let first = register(&app, "first@example.org", "receiver").await;
    let second = register(&app, "second@example.org", "receiver").await;

    let donation = create_donation(
        &app,
        &donor,
        donation_body("Rice", 17.385, 78.4867, Duration::days(2)),
    )
    .await;

    // Donors cannot request food.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/donations/{}/requests", donation),
        Some(&other_donor),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let winner = request_donation(&app, &first, &donation).await;
    // A repeat request from the same receiver is stored too.
    let repeat = request_donation(&app, &first, &donation).await;
    assert_ne!(winner, repeat);
    let loser = request_donation(&app, &second, &donation).await;

    let (_, incoming) = send(&app, Method::GET, "/requests/incoming", Some(&donor), None).await;
    assert_eq!(incoming.as_array().unwrap().len(), 3);
    assert_eq!(incoming[0]["donation"]["id"], donation.as_str());

    let (status, _) = decide(&app, &other_donor, &winner, "accepted").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = decide(&app, &donor, &winner, "pending").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = decide(&app, &donor, &winner, "accepted").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["donation"]["status"], "accepted");

    // Decided once.
    let (status, body) = decide(&app, &donor, &winner, "rejected").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    // The donation already has a winner.
    let (status, _) = decide(&app, &donor, &loser, "accepted").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, body) = decide(&app, &donor, &loser, "rejected").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/donations/{}/requests", donation),
        Some(&second),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, open) = send(&app, Method::GET, "/donations", Some(&second), None).await;
    assert!(open.as_array().unwrap().is_empty());

    let (_, mine) = send(&app, Method::GET, "/requests/mine", Some(&first), None).await;
    let statuses: Vec<&str> = mine
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses.len(), 2);
    assert!(statuses.contains(&"accepted"));
    assert!(statuses.contains(&"pending"));

    let (status, _) = decide(&app, &donor, &uuid_like(), "accepted").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pickup_and_verify_record_impact() {
    let (app, state) = app();
    seed_admin(&state.db, "admin@example.org", "admin-pass").unwrap();

    let donor = register(&app, "donor@example.org", "donor").await;
    let receiver = register(&app, "receiver@example.org", "receiver").await;
    let stranger = register(&app, "stranger@example.org", "receiver").await;
    let volunteer = register(&app, "volunteer@example.org", "volunteer").await;

    let donation = create_donation(
        &app,
        &donor,
        donation_body("Curry", 17.385, 78.4867, Duration::days(2)),
    )
    .await;
    let pickup = format!("/donations/{}/pickup", donation);
    let verify = format!("/donations/{}/verify", donation);

    // Nothing to collect before a request is accepted.
    let (status, _) = send(&app, Method::POST, &pickup, Some(&volunteer), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let request = request_donation(&app, &receiver, &donation).await;
    decide(&app, &donor, &request, "accepted").await;

    let (_, dashboard) = send(&app, Method::GET, "/dashboard", Some(&volunteer), None).await;
    assert_eq!(dashboard["role"], "volunteer");
    assert_eq!(dashboard["pickups_available"], 1);

    let (status, _) = send(&app, Method::POST, &pickup, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::POST, &pickup, Some(&volunteer), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "picked");

    let (status, _) = send(
        &app,
        Method::POST,
        &verify,
        Some(&receiver),
        Some(json!({ "food_saved_kg": 4.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, transaction) = send(
        &app,
        Method::POST,
        &verify,
        Some(&donor),
        Some(json!({ "food_saved_kg": 4.0, "people_served": 12, "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{transaction}");
    assert_eq!(transaction["co2_saved_kg"], 10.0);
    assert!(transaction["volunteer_id"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        &verify,
        Some(&donor),
        Some(json!({ "food_saved_kg": 4.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, donation_now) = send(&app, Method::GET, &format!("/donations/{}", donation), Some(&donor), None).await;
    assert_eq!(donation_now["status"], "verified");
    assert_eq!(donation_now["urgency"], "unavailable");

    let (_, dashboard) = send(&app, Method::GET, "/dashboard", Some(&receiver), None).await;
    assert_eq!(dashboard["role"], "receiver");
    assert_eq!(dashboard["people_served"], 12);
    assert_eq!(dashboard["food_saved_kg"], 4.0);
    assert_eq!(dashboard["accepted_requests_count"], 1);

    let (_, dashboard) = send(&app, Method::GET, "/dashboard", Some(&volunteer), None).await;
    assert_eq!(dashboard["pickups_completed"], 1);

    let (_, login) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "admin@example.org", "password": "admin-pass" })),
    )
    .await;
    let admin = login["token"].as_str().unwrap().to_string();

    let (_, dashboard) = send(&app, Method::GET, "/dashboard", Some(&admin), None).await;
    assert_eq!(dashboard["role"], "admin");
    assert_eq!(dashboard["analytics"]["total_transactions"], 1);
    assert_eq!(dashboard["analytics"]["co2_saved_total_kg"], 10.0);
    assert_eq!(dashboard["unverified_profiles"], 4);
}

#[tokio::test]
async fn admin_verifies_profiles() {
    let (app, state) = app();
    seed_admin(&state.db, "admin@example.org", "admin-pass").unwrap();
    let donor = register(&app, "donor@example.org", "donor").await;

    let (_, profile) = send(&app, Method::GET, "/profile", Some(&donor), None).await;
    let uri = format!("/admin/profiles/{}/verify", profile["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::POST, &uri, Some(&donor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, login) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "admin@example.org", "password": "admin-pass" })),
    )
    .await;
    let admin = login["token"].as_str().unwrap().to_string();

    let (status, verified) = send(&app, Method::POST, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["is_verified"], true);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/admin/profiles/{}/verify", uuid_like()),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn uuid_like() -> String {
    "00000000-0000-4000-8000-000000000000".to_string()
}
