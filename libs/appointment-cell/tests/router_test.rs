use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json");

    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn booking_body(patient_id: Uuid, doctor_id: Uuid, reason: &str) -> Value {
    json!({
        "patient_id": patient_id,
        "doctor_id": doctor_id,
        "appointment_date": "2026-03-01T09:30:00Z",
        "reason": reason,
        "symptoms": null,
        "consultation_fee": 40.0
    })
}

#[tokio::test]
async fn appointment_routes_require_a_token() {
    let config = TestConfig::default();

    let request = Request::builder().uri("/patients/00000000-0000-0000-0000-000000000000").body(Body::empty()).unwrap();
    let response = appointment_routes(config.to_arc()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn patient_cannot_book_for_someone_else() {
    let config = TestConfig::default();
    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let response = appointment_routes(config.to_arc())
        .oneshot(authed("POST", "/", &token, Some(booking_body(Uuid::new_v4(), Uuid::new_v4(), "Checkup"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn listing_everything_is_admin_only() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("d@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    let response = appointment_routes(config.to_arc())
        .oneshot(authed("GET", "/", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn double_booking_returns_conflict_message() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(&doctor_id.to_string(), 1, true)
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "status": "scheduled" }
        ])))
        .mount(&server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed("POST", "/", &token, Some(booking_body(patient.uuid(), doctor_id, "Checkup"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Doctor already has an appointment at this time.");
}

#[tokio::test]
async fn blank_reason_is_a_bad_request() {
    let config = TestConfig::default();
    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let response = appointment_routes(config.to_arc())
        .oneshot(authed("POST", "/", &token, Some(booking_body(patient.uuid(), Uuid::new_v4(), ""))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancelling_completed_appointment_is_unprocessable() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id.to_string(),
                &patient.id,
                &Uuid::new_v4().to_string(),
                Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
                "completed",
            )
        ])))
        .mount(&server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed("POST", &format!("/{}/cancel", appointment_id), &token, Some(json!({ "reason": null }))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Cannot cancel a completed appointment.");
}

#[tokio::test]
async fn patient_cannot_change_status() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id.to_string(),
                &patient.id,
                &Uuid::new_v4().to_string(),
                Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
                "scheduled",
            )
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed("PATCH", &format!("/{}/status", appointment_id), &token, Some(json!({ "status": "completed" }))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn outsider_cannot_view_appointment() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let outsider = TestUser::patient("o@example.com");
    let token = JwtTestUtils::create_test_token(&outsider, &config.jwt_secret, None);
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
                "scheduled",
            )
        ])))
        .mount(&server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed("GET", &format!("/{}", appointment_id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn conflict_check_reports_free_slot() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = format!("/conflicts/check?doctor_id={}&appointment_date=2026-03-01T09:30:00Z", doctor_id);
    let response = appointment_routes(config.to_arc())
        .oneshot(authed("GET", &uri, &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["has_conflict"], false);
    assert!(body["conflicting_appointment_id"].is_null());
}

#[tokio::test]
async fn booking_unapproved_doctor_is_a_bad_request() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let patient = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(&doctor_id.to_string(), 1, false)
        ])))
        .mount(&server)
        .await;

    let response = appointment_routes(config.to_arc())
        .oneshot(authed("POST", "/", &token, Some(booking_body(patient.uuid(), doctor_id, "Checkup"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Doctor is not available for booking.");
}
