mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn administrators_manage_staff_accounts() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/v1/users",
            json!({
                "name": "Nia Mechanic",
                "email": "nia@workshop.test",
                "password": "spanner-and-socket",
                "role": "technician",
                "break_start": "11:00",
                "break_end": "11:30",
            }),
            &app.admin,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let user = body["data"].clone();
    assert_eq!(user["role"], "technician");
    assert!(user.get("password_hash").is_none());
    let uri = format!("/api/v1/users/{}", user["id"].as_str().unwrap());

    let (status, _) = app
        .post(
            "/api/v1/users",
            json!({
                "name": "Nia Again",
                "email": "NIA@workshop.test",
                "password": "spanner-and-socket",
                "role": "technician",
            }),
            &app.admin,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .put(&uri, json!({ "is_active": false }), &app.admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    // Inactive technicians drop out of the directory.
    let (_, body) = app.get("/api/v1/users/technicians", &app.advisor).await;
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|t| t["name"] != "Nia Mechanic"));

    let (status, _) = app.delete(&uri, &app.admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, &app.admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn account_rules() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post(
            "/api/v1/users",
            json!({ "name": "Short", "email": "s@workshop.test", "password": "abc", "role": "technician" }),
            &app.admin,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let own = format!("/api/v1/users/{}", app.admin.user.id);
    let (status, _) = app.delete(&own, &app.admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/v1/users", &app.controller).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/v1/users?role=technician", &app.admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn anyone_reports_bugs_and_administrators_triage_them() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/v1/bug-reports",
            json!({ "title": "Board freezes", "description": "The daily board stops refreshing after lunch." }),
            &app.technician,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let report = body["data"].clone();
    assert_eq!(report["status"], "open");
    assert_eq!(report["reported_by"], app.technician.user.id.to_string());
    let uri = format!("/api/v1/bug-reports/{}", report["id"].as_str().unwrap());

    let (status, _) = app.get("/api/v1/bug-reports", &app.technician).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(&uri, json!({ "status": "in-progress" }), &app.admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in-progress");

    let (_, body) = app.get("/api/v1/bug-reports?status=in-progress", &app.admin).await;
    assert_eq!(body["data"]["total"], 1);
    let (_, body) = app.get("/api/v1/bug-reports?status=open", &app.admin).await;
    assert_eq!(body["data"]["total"], 0);

    let (status, _) = app.delete(&uri, &app.admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn status_and_docs_are_served() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/v1/status", &app.technician).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], "workshop-api");
    assert_eq!(body["data"]["environment"], "test");

    let (status, body) = app
        .send(axum::http::Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Workshop API");
}
