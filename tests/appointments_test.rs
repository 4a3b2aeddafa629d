mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{job_body, TestApp};

const DAY: &str = "2030-03-04";

async fn book(app: &TestApp, start: &str, end: &str) -> Value {
    let (status, body) = app
        .post(
            "/api/v1/appointments",
            json!({
                "plate_number": "nbc 1234",
                "time_start": start,
                "time_end": end,
                "date": DAY,
                "assigned_technician": app.technician.user.id,
                "notes": "Customer waits on site",
            }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

fn appointment_uri(appt: &Value, action: &str) -> String {
    let id = appt["id"].as_str().expect("appointment id");
    if action.is_empty() {
        format!("/api/v1/appointments/{}", id)
    } else {
        format!("/api/v1/appointments/{}/{}", id, action)
    }
}

#[tokio::test]
async fn appointment_becomes_a_job_on_the_same_slot() {
    let app = TestApp::new().await;
    let appt = book(&app, "10:00", "11:30").await;
    assert_eq!(appt["plate_number"], "NBC 1234");

    let (status, body) = app
        .post(
            &appointment_uri(&appt, "create-job-order"),
            json!({
                "job_number": "jo-500",
                "job_list": [{"description": "Diagnose rattle", "status": "Unfinished"}],
                "parts": [],
            }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let job = &body["data"];
    assert_eq!(job["job_number"], "JO-500");
    assert_eq!(job["status"], "OG");
    assert_eq!(job["source_type"], "appointment");
    assert_eq!(job["time_start"], "10:00");
    assert_eq!(job["time_end"], "11:30");
    assert_eq!(job["plate_number"], "NBC 1234");
    assert_eq!(job["assigned_technician"], app.technician.user.id.to_string());
    assert_eq!(job["notes"], "Customer waits on site");

    let (status, _) = app.get(&appointment_uri(&appt, ""), &app.advisor).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_conversion_keeps_the_appointment() {
    let app = TestApp::new().await;
    app.create_job(job_body("JO-501", DAY, json!({}))).await;
    let appt = book(&app, "14:00", "15:00").await;

    let (status, _) = app
        .post(
            &appointment_uri(&appt, "create-job-order"),
            json!({ "job_number": "JO-501", "job_list": [], "parts": [] }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.get(&appointment_uri(&appt, ""), &app.advisor).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["time_start"], "14:00");
    assert_eq!(body["data"]["id"], appt["id"]);

    // Nothing half-written: only the original job exists, and a retry works.
    let (_, body) = app
        .get(&format!("/api/v1/job-orders?date={}", DAY), &app.advisor)
        .await;
    assert_eq!(body["data"]["total"], 1);

    let (status, body) = app
        .post(
            &appointment_uri(&appt, "create-job-order"),
            json!({ "job_number": "JO-501B", "job_list": [], "parts": [] }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["time_start"], "14:00");
    let (status, _) = app.get(&appointment_uri(&appt, ""), &app.advisor).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn no_show_cannot_be_converted_and_can_be_purged() {
    let app = TestApp::new().await;
    let appt = book(&app, "08:00", "09:00").await;

    let (status, body) = app
        .post(&appointment_uri(&appt, "no-show"), json!({}), &app.advisor)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["no_show"], true);

    let (status, _) = app
        .post(
            &appointment_uri(&appt, "create-job-order"),
            json!({ "job_number": "JO-502", "job_list": [], "parts": [] }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Purging is for controllers, and only reaches days strictly before the cutoff.
    let (status, _) = app
        .delete("/api/v1/appointments/no-show?before=2030-03-05", &app.advisor)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .delete("/api/v1/appointments/no-show?before=2030-03-04", &app.controller)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 0);

    let (status, body) = app
        .delete("/api/v1/appointments/no-show?before=2030-03-05", &app.controller)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 1);
}

#[tokio::test]
async fn appointments_and_jobs_share_the_technicians_day() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;
    app.create_job(job_body("JO-503", DAY, json!({ "assigned_technician": tech })))
        .await;

    let (status, _) = app
        .post(
            "/api/v1/appointments",
            json!({
                "plate_number": "abc 1",
                "time_start": "09:30",
                "time_end": "10:30",
                "date": DAY,
                "assigned_technician": tech,
            }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let appt = book(&app, "10:00", "11:00").await;
    let (status, _) = app
        .post(
            "/api/v1/job-orders",
            job_body(
                "JO-504",
                DAY,
                json!({ "assigned_technician": tech, "time_start": "10:30", "time_end": "11:30" }),
            ),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Moving the appointment within its own slot is not a clash with itself.
    let (status, body) = app
        .put(
            &appointment_uri(&appt, ""),
            json!({ "time_start": "10:00", "time_end": "10:45" }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["time_end"], "10:45");
}

#[tokio::test]
async fn listing_filters_by_day() {
    let app = TestApp::new().await;
    book(&app, "08:00", "09:00").await;

    let (status, body) = app
        .get(&format!("/api/v1/appointments?date={}", DAY), &app.advisor)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = app
        .get("/api/v1/appointments?date=2030-03-05", &app.advisor)
        .await;
    assert_eq!(body["data"]["total"], 0);

    let (status, _) = app.get("/api/v1/appointments", &app.technician).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
