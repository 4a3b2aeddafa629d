mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{job_body, TestApp};

const DAY: &str = "2030-03-04";

fn starts(body: &Value) -> Vec<String> {
    body["data"]["slots"]
        .as_array()
        .expect("slots")
        .iter()
        .filter_map(|s| s.as_str().map(str::to_string))
        .collect()
}

async fn slots(app: &TestApp, technician: Uuid, extra: &str) -> (StatusCode, Value) {
    app.get(
        &format!(
            "/api/v1/job-orders/technicians/{}/slots?date={}&duration=60{}",
            technician, DAY, extra
        ),
        &app.advisor,
    )
    .await
}

#[tokio::test]
async fn slots_avoid_lunch_and_existing_jobs() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;

    let (status, body) = slots(&app, tech, "").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let free = starts(&body);
    assert_eq!(free.first().map(String::as_str), Some("07:00"));
    assert_eq!(free.last().map(String::as_str), Some("17:00"));
    for blocked in ["11:30", "12:00", "12:30"] {
        assert!(!free.iter().any(|s| s == blocked), "{blocked} overlaps lunch");
    }

    app.create_job(job_body("JO-1", DAY, json!({ "assigned_technician": tech })))
        .await;
    let (_, body) = slots(&app, tech, "").await;
    let free = starts(&body);
    assert!(free.iter().any(|s| s == "08:00"));
    assert!(free.iter().any(|s| s == "10:00"));
    for blocked in ["08:30", "09:00", "09:30"] {
        assert!(!free.iter().any(|s| s == blocked), "{blocked} overlaps the job");
    }
}

#[tokio::test]
async fn break_can_be_overridden_per_query_or_per_technician() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;

    let (status, body) = slots(&app, tech, "&break_start=13:00&break_end=14:00").await;
    assert_eq!(status, StatusCode::OK);
    let free = starts(&body);
    assert!(free.iter().any(|s| s == "12:00"));
    assert!(!free.iter().any(|s| s == "13:00"));

    let early = app.add_technician("Bo Early", Some(("10:00", "10:30"))).await;
    let (_, body) = slots(&app, early.user.id, "").await;
    let free = starts(&body);
    assert!(!free.iter().any(|s| s == "10:00"));
    assert!(free.iter().any(|s| s == "12:00"));
}

#[tokio::test]
async fn bad_slot_queries_are_rejected() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;

    let (status, _) = slots(&app, tech, "&break_start=13:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = slots(&app, app.advisor.user.id, "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(
            &format!(
                "/api/v1/job-orders/technicians/{}/slots?date=04-03-2030&duration=60",
                tech
            ),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_durations_are_bad_requests() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;

    let (status, _) = app
        .get(
            &format!(
                "/api/v1/job-orders/technicians/{}/slots?date={}&duration={}",
                tech,
                DAY,
                u32::MAX
            ),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(
            &format!("/api/v1/job-orders/end-time?start=09:00&duration={}", u32::MAX),
            &app.technician,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn available_technicians_excludes_the_busy_ones() {
    let app = TestApp::new().await;
    let busy = app.technician.user.id;
    let spare = app.add_technician("Ben Wrench", None).await;
    app.create_job(job_body("JO-2", DAY, json!({ "assigned_technician": busy })))
        .await;

    let (status, body) = app
        .get(
            &format!(
                "/api/v1/job-orders/technicians/available?date={}&start=09:30&end=10:30",
                DAY
            ),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert_eq!(ids, vec![spare.user.id.to_string()]);

    // Spanning lunch rules out everyone.
    let (_, body) = app
        .get(
            &format!(
                "/api/v1/job-orders/technicians/available?date={}&start=11:00&end=13:00",
                DAY
            ),
            &app.advisor,
        )
        .await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn walk_ins_are_capped_by_remaining_hours() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;
    app.create_job(job_body(
        "JO-3",
        DAY,
        json!({ "assigned_technician": tech, "time_start": "07:00", "time_end": "11:00" }),
    ))
    .await;
    app.create_job(job_body(
        "JO-4",
        DAY,
        json!({ "assigned_technician": tech, "time_start": "13:00", "time_end": "16:00" }),
    ))
    .await;

    let (status, body) = app
        .get(&format!("/api/v1/job-orders/walk-in-slots?date={}", DAY), &app.advisor)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entry = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["technician"]["id"] == tech.to_string())
        .expect("technician entry")
        .clone();
    assert_eq!(entry["remaining_minutes"], 60);
    assert_eq!(entry["slots"], json!(["11:00"]));
}

#[tokio::test]
async fn appointments_hold_the_slot_until_marked_no_show() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;

    let (status, body) = app
        .post(
            "/api/v1/appointments",
            json!({
                "plate_number": "ngh 4410",
                "time_start": "14:00",
                "time_end": "15:00",
                "date": DAY,
                "assigned_technician": tech,
            }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let appointment_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = slots(&app, tech, "").await;
    assert!(!starts(&body).iter().any(|s| s == "14:00"));

    let (status, _) = app
        .post(
            &format!("/api/v1/appointments/{}/no-show", appointment_id),
            json!({}),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = slots(&app, tech, "").await;
    assert!(starts(&body).iter().any(|s| s == "14:00"));
}

#[tokio::test]
async fn end_time_pauses_over_the_break() {
    let app = TestApp::new().await;

    let (status, body) = app
        .get("/api/v1/job-orders/end-time?start=11:30&duration=60", &app.technician)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["end"], "13:30");

    let (_, body) = app
        .get("/api/v1/job-orders/end-time?start=08:00&duration=90", &app.technician)
        .await;
    assert_eq!(body["data"]["end"], "09:30");

    let (_, body) = app
        .get(
            "/api/v1/job-orders/end-time?start=14:30&duration=60&break_start=15:00&break_end=15:15",
            &app.technician,
        )
        .await;
    assert_eq!(body["data"]["end"], "15:45");

    let (status, _) = app
        .get("/api/v1/job-orders/end-time?start=11:30&duration=0", &app.technician)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn technician_directory_lists_technicians_only() {
    let app = TestApp::new().await;
    app.add_technician("Ben Wrench", None).await;

    let (status, body) = app.get("/api/v1/users/technicians", &app.technician).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Ben Wrench", "Tia Technician"]);
}
