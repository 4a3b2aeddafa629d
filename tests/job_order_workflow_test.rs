mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{job_body, TestApp};

const DAY: &str = "2030-03-04";

fn job_uri(job: &Value, action: &str) -> String {
    let id = job["id"].as_str().expect("job id");
    if action.is_empty() {
        format!("/api/v1/job-orders/{}", id)
    } else {
        format!("/api/v1/job-orders/{}/{}", id, action)
    }
}

#[tokio::test]
async fn initial_status_follows_technician_and_parts() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;

    let plotted = app
        .create_job(job_body("jo-100", DAY, json!({ "assigned_technician": tech })))
        .await;
    assert_eq!(plotted["status"], "OG");
    assert_eq!(plotted["job_number"], "JO-100");
    assert_eq!(plotted["plate_number"], "ABC-123");
    assert_eq!(plotted["source_type"], "direct");

    let unplotted = app.create_job(job_body("jo-101", DAY, json!({}))).await;
    assert_eq!(unplotted["status"], "FP");
    assert!(unplotted["assigned_technician"].is_null());

    let waiting = app
        .create_job(job_body(
            "jo-102",
            DAY,
            json!({
                "time_start": "13:00",
                "time_end": "14:00",
                "assigned_technician": tech,
                "parts": [{"name": "Brake pads", "availability": "Unavailable"}],
            }),
        ))
        .await;
    assert_eq!(waiting["status"], "WP");
}

#[tokio::test]
async fn job_numbers_are_unique_regardless_of_case() {
    let app = TestApp::new().await;
    app.create_job(job_body("JO-7", DAY, json!({}))).await;

    let (status, body) = app
        .post("/api/v1/job-orders", job_body(" jo-7 ", DAY, json!({})), &app.advisor)
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn overlapping_booking_for_the_same_technician_is_refused() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;
    app.create_job(job_body("JO-1", DAY, json!({ "assigned_technician": tech })))
        .await;

    let clash = job_body(
        "JO-2",
        DAY,
        json!({ "assigned_technician": tech, "time_start": "09:30", "time_end": "10:30" }),
    );
    let (status, _) = app.post("/api/v1/job-orders", clash, &app.advisor).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Touching end to start is not an overlap.
    let adjacent = job_body(
        "JO-3",
        DAY,
        json!({ "assigned_technician": tech, "time_start": "10:00", "time_end": "11:00" }),
    );
    let (status, _) = app.post("/api/v1/job-orders", adjacent, &app.advisor).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn malformed_times_are_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post(
            "/api/v1/job-orders",
            job_body("JO-9", DAY, json!({ "time_start": "9am" })),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/v1/job-orders",
            job_body("JO-9", DAY, json!({ "time_start": "11:00", "time_end": "10:00" })),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quality_inspection_round_trip() {
    let app = TestApp::new().await;
    let job = app
        .create_job(job_body(
            "JO-20",
            DAY,
            json!({ "assigned_technician": app.technician.user.id }),
        ))
        .await;

    // Unfinished labour blocks QI.
    let (status, body) = app.post(&job_uri(&job, "submit-qi"), json!({}), &app.technician).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = app
        .patch(
            &job_uri(&job, "tasks"),
            json!({ "job_list": [{"description": "Oil change", "status": "Finished"}] }),
            &app.technician,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post(&job_uri(&job, "submit-qi"), json!({}), &app.technician).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "QI");
    assert_eq!(body["data"]["qi_status"], "pending");

    let (status, _) = app.post(&job_uri(&job, "submit-qi"), json!({}), &app.technician).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Technicians cannot sign off their own work.
    let (status, _) = app.post(&job_uri(&job, "approve-qi"), json!({}), &app.technician).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post(&job_uri(&job, "approve-qi"), json!({}), &app.controller).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "FR");
    assert_eq!(body["data"]["qi_status"], "approved");

    let (status, body) = app.post(&job_uri(&job, "complete"), json!({}), &app.advisor).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CP");

    let (status, body) = app.post(&job_uri(&job, "redo"), json!({}), &app.controller).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "OG");
    assert!(body["data"]["qi_status"].is_null());
}

#[tokio::test]
async fn rejected_inspection_sends_the_job_back_to_work() {
    let app = TestApp::new().await;
    let job = app
        .create_job(job_body(
            "JO-21",
            DAY,
            json!({
                "assigned_technician": app.technician.user.id,
                "job_list": [{"description": "Alignment", "status": "Finished"}],
            }),
        ))
        .await;

    let (status, _) = app.post(&job_uri(&job, "submit-qi"), json!({}), &app.technician).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post(&job_uri(&job, "reject-qi"), json!({}), &app.controller).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "OG");
    assert_eq!(body["data"]["qi_status"], "rejected");
}

#[tokio::test]
async fn open_jobs_cannot_be_completed_or_redone() {
    let app = TestApp::new().await;
    let job = app.create_job(job_body("JO-30", DAY, json!({}))).await;

    let (status, _) = app.post(&job_uri(&job, "complete"), json!({}), &app.advisor).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&job_uri(&job, "redo"), json!({}), &app.controller).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_changes_follow_the_transition_table() {
    let app = TestApp::new().await;
    let job = app
        .create_job(job_body(
            "JO-40",
            DAY,
            json!({ "assigned_technician": app.technician.user.id }),
        ))
        .await;
    let uri = job_uri(&job, "status");

    let (status, body) = app.patch(&uri, json!({ "status": "HC" }), &app.controller).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "HC");

    let (status, _) = app.patch(&uri, json!({ "status": "CP" }), &app.controller).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(&uri, json!({ "status": "CP", "force": true }), &app.controller)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&uri, json!({ "status": "CP", "force": true }), &app.admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CP");
}

#[tokio::test]
async fn forcing_into_inspection_still_checks_the_work() {
    let app = TestApp::new().await;
    let job = app.create_job(job_body("JO-41", DAY, json!({}))).await;

    let (status, _) = app
        .patch(
            &job_uri(&job, "status"),
            json!({ "status": "QI", "force": true }),
            &app.admin,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_part_takes_an_active_job_off_the_board() {
    let app = TestApp::new().await;
    let tech = app.technician.user.id;
    let job = app
        .create_job(job_body(
            "JO-50",
            DAY,
            json!({ "assigned_technician": tech, "time_end": "11:00" }),
        ))
        .await;

    let (status, body) = app
        .patch(
            &job_uri(&job, "parts"),
            json!({ "parts": [{"name": "Oil filter", "availability": "Unavailable"}] }),
            &app.technician,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let outcome = &body["data"];
    assert_eq!(outcome["job"]["status"], "WP");
    assert!(outcome["job"]["assigned_technician"].is_null());

    // The job is dated ahead of today, so its whole slot comes back.
    assert_eq!(outcome["freed_slot"]["technician_id"], tech.to_string());
    assert_eq!(outcome["freed_slot"]["from"], "09:00");
    assert_eq!(outcome["freed_slot"]["to"], "11:00");

    let (status, body) = app
        .patch(
            &job_uri(&job, "parts"),
            json!({ "parts": [{"name": "Oil filter", "availability": "Available"}] }),
            &app.technician,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["job"]["status"], "FP");
    assert!(body["data"]["freed_slot"].is_null());

    let (status, body) = app
        .post(
            &job_uri(&job, "replot"),
            json!({ "technician_id": tech, "time_start": "14:00", "time_end": "15:00" }),
            &app.controller,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "OG");
    assert_eq!(body["data"]["time_start"], "14:00");
    assert_eq!(body["data"]["assigned_technician"], tech.to_string());
}

#[tokio::test]
async fn reassigning_an_unplotted_job_puts_it_on_the_board() {
    let app = TestApp::new().await;
    let job = app.create_job(job_body("JO-60", DAY, json!({}))).await;
    assert_eq!(job["status"], "FP");

    let (status, body) = app
        .put(
            &job_uri(&job, ""),
            json!({ "assigned_technician": app.technician.user.id }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "OG");
}

#[tokio::test]
async fn important_flag_toggles() {
    let app = TestApp::new().await;
    let job = app.create_job(job_body("JO-70", DAY, json!({}))).await;
    assert_eq!(job["is_important"], false);

    let (_, body) = app
        .post(&job_uri(&job, "toggle-important"), json!({}), &app.advisor)
        .await;
    assert_eq!(body["data"]["is_important"], true);
    let (_, body) = app
        .post(&job_uri(&job, "toggle-important"), json!({}), &app.advisor)
        .await;
    assert_eq!(body["data"]["is_important"], false);
}

#[tokio::test]
async fn listing_filters_by_status_and_plate() {
    let app = TestApp::new().await;
    app.create_job(job_body(
        "JO-80",
        DAY,
        json!({ "assigned_technician": app.technician.user.id, "plate_number": "xyz-987" }),
    ))
    .await;
    app.create_job(job_body("JO-81", DAY, json!({}))).await;

    let (status, body) = app
        .get(&format!("/api/v1/job-orders?date={}&status=FP", DAY), &app.technician)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["job_number"], "JO-81");

    let (_, body) = app
        .get("/api/v1/job-orders?search=xyz", &app.technician)
        .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["plate_number"], "XYZ-987");
}

#[tokio::test]
async fn far_out_pages_are_empty() {
    let app = TestApp::new().await;
    app.create_job(job_body("JO-85", DAY, json!({}))).await;

    for uri in [
        format!("/api/v1/job-orders?page={}", u64::MAX),
        format!("/api/v1/audit-logs?page={}&limit=100", u64::MAX),
    ] {
        let (status, body) = app.get(&uri, &app.admin).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
        assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(0));
        assert!(body["data"]["total"].as_u64().is_some_and(|t| t >= 1));
    }
}

#[tokio::test]
async fn roles_guard_the_endpoints() {
    let app = TestApp::new().await;
    let job = app.create_job(job_body("JO-90", DAY, json!({}))).await;

    let (status, _) = app.send(Method::GET, "/api/v1/job-orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/api/v1/job-orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post("/api/v1/job-orders", job_body("JO-91", DAY, json!({})), &app.technician)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&job_uri(&job, ""), &app.advisor).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&job_uri(&job, ""), &app.admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&job_uri(&job, ""), &app.admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
