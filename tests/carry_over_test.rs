mod common;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{job_body, TestApp};

const CLOSING: &str = "2030-03-04";
const NEXT: &str = "2030-03-05";

fn id_of(job: &Value) -> Uuid {
    job["id"].as_str().and_then(|s| s.parse().ok()).expect("job id")
}

async fn fetch(app: &TestApp, job: &Value) -> Value {
    let (status, body) = app
        .get(&format!("/api/v1/job-orders/{}", id_of(job)), &app.admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    body["data"].clone()
}

/// One active job, one in inspection and one released job on the closing day.
async fn seed_day(app: &TestApp) -> (Value, Value, Value) {
    let tech = app.technician.user.id;
    let active = app
        .create_job(job_body("JO-A", CLOSING, json!({ "assigned_technician": tech })))
        .await;

    let inspected = app
        .create_job(job_body(
            "JO-Q",
            CLOSING,
            json!({
                "assigned_technician": tech,
                "time_start": "10:00",
                "time_end": "11:00",
                "job_list": [{"description": "Brake bleed", "status": "Finished"}],
            }),
        ))
        .await;
    let (status, _) = app
        .post(
            &format!("/api/v1/job-orders/{}/submit-qi", id_of(&inspected)),
            json!({}),
            &app.technician,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let released = app
        .create_job(job_body(
            "JO-R",
            CLOSING,
            json!({
                "assigned_technician": tech,
                "time_start": "14:00",
                "time_end": "15:00",
                "job_list": [{"description": "Tyre rotation", "status": "Finished"}],
            }),
        ))
        .await;
    for action in ["submit-qi", "approve-qi"] {
        let (status, _) = app
            .post(
                &format!("/api/v1/job-orders/{}/{}", id_of(&released), action),
                json!({}),
                &app.controller,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    (active, inspected, released)
}

#[tokio::test]
async fn preview_reports_without_moving_anything() {
    let app = TestApp::new().await;
    let (active, _, _) = seed_day(&app).await;

    let (status, body) = app
        .get(
            &format!("/api/v1/job-orders/check-carry-over?date={}", CLOSING),
            &app.controller,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["next_date"], NEXT);
    assert_eq!(report["carried"].as_array().map(Vec::len), Some(2));

    let unchanged = fetch(&app, &active).await;
    assert_eq!(unchanged["date"], CLOSING);
    assert_eq!(unchanged["carried_over"], false);
}

#[tokio::test]
async fn end_of_day_rolls_open_jobs_to_the_next_day() {
    let app = TestApp::new().await;
    let (active, inspected, released) = seed_day(&app).await;
    let tech = app.technician.user.id.to_string();

    let (status, body) = app
        .post(
            "/api/v1/job-orders/check-carry-over",
            json!({ "date": CLOSING }),
            &app.controller,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let report = &body["data"];
    assert_eq!(report["dry_run"], false);
    assert_eq!(report["carried"].as_array().map(Vec::len), Some(2));
    assert!(report["failed"].as_array().is_some_and(|f| f.is_empty()));

    let active = fetch(&app, &active).await;
    assert_eq!(active["date"], NEXT);
    assert_eq!(active["original_created_date"], CLOSING);
    assert_eq!(active["carried_over"], true);
    assert_eq!(active["status"], "OG");
    assert!(active["assigned_technician"].is_null());
    let chain = active["carry_over_chain"].as_array().expect("chain");
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0]["date"], CLOSING);
    assert_eq!(chain[0]["status"], "OG");

    // Jobs waiting on inspection keep their technician.
    let inspected = fetch(&app, &inspected).await;
    assert_eq!(inspected["date"], NEXT);
    assert_eq!(inspected["status"], "QI");
    assert_eq!(inspected["assigned_technician"], tech);

    let released = fetch(&app, &released).await;
    assert_eq!(released["date"], CLOSING);
    assert_eq!(released["carried_over"], false);
}

#[tokio::test]
async fn running_twice_does_not_roll_twice() {
    let app = TestApp::new().await;
    seed_day(&app).await;
    let closing = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
    let actor = app.actor(&app.controller);

    let first = app
        .state
        .services
        .carry_over
        .run(closing, &actor)
        .await
        .unwrap();
    assert_eq!(first.carried.len(), 2);

    let second = app
        .state
        .services
        .carry_over
        .run(closing, &actor)
        .await
        .unwrap();
    assert!(second.carried.is_empty());
}

#[tokio::test]
async fn chain_grows_each_day_a_job_stays_open() {
    let app = TestApp::new().await;
    let job = app.create_job(job_body("JO-C", CLOSING, json!({}))).await;
    let services = &app.state.services;
    let actor = app.actor(&app.controller);

    let day = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
    for offset in 0..3 {
        let report = services
            .carry_over
            .run(day + chrono::Days::new(offset), &actor)
            .await
            .unwrap();
        assert_eq!(report.carried.len(), 1);
    }

    let stored = services.job_orders.get(id_of(&job)).await.unwrap();
    let chain = stored.chain().unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(stored.date, NaiveDate::from_ymd_opt(2030, 3, 7).unwrap());
    assert_eq!(chain.last().map(|e| e.date), NaiveDate::from_ymd_opt(2030, 3, 6));
    assert_eq!(stored.original_created_date, day);
}

#[tokio::test]
async fn job_moved_back_onto_a_closed_day_is_skipped() {
    let app = TestApp::new().await;
    let job = app.create_job(job_body("JO-S", CLOSING, json!({}))).await;
    let closing = NaiveDate::from_ymd_opt(2030, 3, 4).unwrap();
    let actor = app.actor(&app.controller);

    app.state.services.carry_over.run(closing, &actor).await.unwrap();
    let (status, _) = app
        .put(
            &format!("/api/v1/job-orders/{}", id_of(&job)),
            json!({ "date": CLOSING }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let report = app.state.services.carry_over.run(closing, &actor).await.unwrap();
    assert!(report.carried.is_empty());
    assert_matches!(
        report.skipped.as_slice(),
        [skipped] if skipped.reason.contains("already carried over")
    );
}

#[tokio::test]
async fn every_carried_job_is_audited() {
    let app = TestApp::new().await;
    let (active, _, _) = seed_day(&app).await;

    let (status, _) = app
        .post(
            "/api/v1/job-orders/check-carry-over",
            json!({ "date": CLOSING }),
            &app.controller,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .get(
            &format!(
                "/api/v1/audit-logs?entity_type=JobOrder&entity_id={}",
                id_of(&active)
            ),
            &app.admin,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"]["items"].as_array().expect("entries");
    let carry = entries
        .iter()
        .find(|e| e["action"] == "carry-over")
        .expect("carry-over entry");
    assert_eq!(carry["actor_email"], app.controller.user.email);
}

#[tokio::test]
async fn only_controllers_run_end_of_day() {
    let app = TestApp::new().await;
    let (status, _) = app
        .post(
            "/api/v1/job-orders/check-carry-over",
            json!({ "date": CLOSING }),
            &app.advisor,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
