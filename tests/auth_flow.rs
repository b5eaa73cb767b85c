use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chw_portal::api::models::{
    Commodity, CommodityRequest, Credentials, ReviewAction, Role, UserProfile,
};
use chw_portal::api::{ApiClient, ApiError};
use chw_portal::auth::{navigate, AuthController, AuthState, GuardDecision, LoginOutcome};
use chw_portal::forms::{submit_request, submit_review, RequestDraft, ReviewDraft};
use chw_portal::routes::{Navigator, Route};
use chw_portal::session::SessionStore;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

const CHW_PROFILE: &str = r#"{
    "id": 3,
    "username": "chw1",
    "role": "CHW",
    "first_name": "Amina",
    "last_name": "Otieno",
    "location": "Kisumu"
}"#;

fn token(exp_offset_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + exp_offset_secs;
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp, "user_id": 3 }).to_string());
    format!("{}.{}.signature", header, payload)
}

async fn setup_with(session: SessionStore) -> (ServerGuard, AuthController) {
    let server = Server::new_async().await;
    let client = ApiClient::new(
        format!("{}/api", server.url()),
        Duration::from_secs(5),
        session,
        Navigator::new(),
    )
    .unwrap();
    (server, AuthController::new(client))
}

async fn setup() -> (ServerGuard, AuthController) {
    setup_with(SessionStore::in_memory()).await
}

#[tokio::test]
async fn wrong_password_fails_and_leaves_storage_untouched() {
    let session = SessionStore::in_memory();
    let existing: UserProfile = serde_json::from_str(CHW_PROFILE).unwrap();
    session.save("access-before", "refresh-before").await.unwrap();
    session.save_user(&existing).await.unwrap();
    let (mut server, auth) = setup_with(session).await;

    let mock = server
        .mock("POST", "/api/auth/login/")
        .match_body(Matcher::Json(json!({"username": "chw1", "password": "wrong"})))
        .with_status(400)
        .with_body(r#"{"non_field_errors": ["Invalid credentials"]}"#)
        .create_async()
        .await;

    let outcome = auth
        .login(&Credentials {
            username: "chw1".to_string(),
            password: "wrong".to_string(),
        })
        .await;

    mock.assert_async().await;
    assert_eq!(outcome.error(), Some("Invalid credentials"));
    assert_eq!(
        auth.snapshot(),
        AuthState::Unauthenticated {
            error: Some("Invalid credentials".to_string())
        }
    );
    let session = auth.client().session();
    assert_eq!(session.access_token().await.as_deref(), Some("access-before"));
    assert_eq!(session.refresh_token().await.as_deref(), Some("refresh-before"));
    assert_eq!(session.user().await, Some(existing));
}

#[tokio::test]
async fn login_failure_without_message_uses_fallback() {
    let (mut server, auth) = setup().await;

    server
        .mock("POST", "/api/auth/login/")
        .with_status(500)
        .with_body("Internal Server Error")
        .create_async()
        .await;

    let outcome = auth
        .login(&Credentials {
            username: "chw1".to_string(),
            password: "pw".to_string(),
        })
        .await;
    assert_eq!(outcome.error(), Some("Login failed"));
    assert!(!auth.snapshot().is_authenticated());
}

#[tokio::test]
async fn correct_login_persists_tokens_and_user() {
    let (mut server, auth) = setup().await;
    let access = token(3600);
    let mut rx = auth.subscribe();

    server
        .mock("POST", "/api/auth/login/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(
            json!({
                "access": access,
                "refresh": "refresh-1",
                "user": serde_json::from_str::<serde_json::Value>(CHW_PROFILE).unwrap(),
            })
            .to_string(),
        )
        .create_async()
        .await;

    let outcome = auth
        .login(&Credentials {
            username: "chw1".to_string(),
            password: "correct horse".to_string(),
        })
        .await;

    let user = match outcome {
        LoginOutcome::Success(user) => user,
        other => panic!("expected success, got {:?}", other),
    };
    assert_eq!(user.role, Role::Chw);
    assert_eq!(user.full_name(), "Amina Otieno");

    let session = auth.client().session();
    assert_eq!(session.access_token().await.as_deref(), Some(access.as_str()));
    assert_eq!(session.refresh_token().await.as_deref(), Some("refresh-1"));
    assert_eq!(session.user().await.map(|u| u.username), Some("chw1".to_string()));

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().user(), Some(&user));
    assert_eq!(auth.current_user(), Some(user));
}

#[tokio::test]
async fn restore_with_valid_token_authenticates() {
    let session = SessionStore::in_memory();
    session.save(&token(600), "refresh-1").await.unwrap();
    let (mut server, auth) = setup_with(session).await;

    let profile = server
        .mock("GET", "/api/auth/profile/")
        .match_header("authorization", Matcher::Regex("^Bearer .+".into()))
        .with_status(200)
        .with_body(CHW_PROFILE)
        .expect(1)
        .create_async()
        .await;

    let state = auth.restore_session().await;
    profile.assert_async().await;

    assert!(state.is_authenticated());
    assert_eq!(state.role(), Some(Role::Chw));
    assert!(auth.client().session().user().await.is_some());
    assert_eq!(navigate(&state, Route::NewRequest), GuardDecision::Render);
    assert_eq!(
        navigate(&state, Route::Pending),
        GuardDecision::Redirect(Route::Unauthorized)
    );
}

#[tokio::test]
async fn restore_with_expired_token_makes_no_request() {
    let session = SessionStore::in_memory();
    session.save(&token(-60), "refresh-1").await.unwrap();
    let (mut server, auth) = setup_with(session).await;

    let profile = server
        .mock("GET", "/api/auth/profile/")
        .expect(0)
        .create_async()
        .await;

    let state = auth.restore_session().await;
    profile.assert_async().await;
    assert_eq!(state, AuthState::Unauthenticated { error: None });
    assert!(auth.client().session().is_empty().await);
    assert_eq!(navigate(&state, Route::Dashboard), GuardDecision::Redirect(Route::Login));
}

#[tokio::test]
async fn restore_rejected_by_server_surfaces_error() {
    let session = SessionStore::in_memory();
    session.save(&token(600), "refresh-1").await.unwrap();
    let (mut server, auth) = setup_with(session).await;

    server
        .mock("GET", "/api/auth/profile/")
        .with_status(500)
        .create_async()
        .await;

    let state = auth.restore_session().await;
    assert_eq!(state.error(), Some("Authentication failed"));
    assert!(auth.client().session().is_empty().await);
}

#[tokio::test]
async fn logout_clears_session_even_when_server_fails() {
    let session = SessionStore::in_memory();
    session.save(&token(600), "refresh-1").await.unwrap();
    let (mut server, auth) = setup_with(session).await;

    let logout = server
        .mock("POST", "/api/auth/logout/")
        .match_body(Matcher::Json(json!({"refresh": "refresh-1"})))
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    auth.logout().await;

    logout.assert_async().await;
    assert!(auth.client().session().is_empty().await);
    assert_eq!(auth.snapshot(), AuthState::Unauthenticated { error: None });
}

#[tokio::test]
async fn out_of_range_quantity_never_reaches_the_server() {
    let (mut server, auth) = setup().await;
    auth.client().session().save(&token(600), "refresh-1").await.unwrap();

    let create = server
        .mock("POST", "/api/requests/create/")
        .expect(0)
        .create_async()
        .await;

    let draft = RequestDraft {
        commodity: Some(2),
        quantity_requested: "150".to_string(),
        reason_for_request: String::new(),
    };
    let err = submit_request(auth.client(), &draft, None).await.unwrap_err();
    assert!(matches!(err, ApiError::Form(_)));
    assert!(err.user_message("Failed to submit request").contains("between 1 and 99"));

    let ors = Commodity {
        id: 2,
        name: "ORS".to_string(),
        unit_of_measure: "sachets".to_string(),
        max_quantity_per_request: 20,
        max_monthly_allocation: 100,
        description: None,
        category: None,
    };
    let draft = RequestDraft {
        quantity_requested: "30".to_string(),
        ..draft
    };
    let err = submit_request(auth.client(), &draft, Some(&ors)).await.unwrap_err();
    assert_eq!(err.user_message(""), "Maximum 20 sachets per request");

    create.assert_async().await;
}

#[tokio::test]
async fn valid_request_is_submitted_with_bearer() {
    let (mut server, auth) = setup().await;
    auth.client().session().save("live", "refresh-1").await.unwrap();

    let create = server
        .mock("POST", "/api/requests/create/")
        .match_header("authorization", "Bearer live")
        .match_body(Matcher::Json(json!({
            "commodity": 2,
            "quantity_requested": 10,
            "reason_for_request": "Outbreak in village"
        })))
        .with_status(201)
        .with_body(r#"{"id": 41, "status": "PENDING"}"#)
        .create_async()
        .await;

    let draft = RequestDraft {
        commodity: Some(2),
        quantity_requested: "10".to_string(),
        reason_for_request: "Outbreak in village".to_string(),
    };
    let created = submit_request(auth.client(), &draft, None).await.unwrap();
    assert_eq!(created["id"], 41);
    create.assert_async().await;
}

#[tokio::test]
async fn rejection_without_reason_is_blocked_locally() {
    let (mut server, auth) = setup().await;

    let update = server
        .mock("PUT", "/api/requests/7/")
        .expect(0)
        .create_async()
        .await;

    let draft = ReviewDraft {
        action: Some(ReviewAction::Rejected),
        ..Default::default()
    };
    let err = submit_review(auth.client(), 7, &draft, None).await.unwrap_err();
    assert_eq!(err.user_message(""), "Please provide a reason for rejection");
    update.assert_async().await;
}

fn pending_request(quantity_requested: u32) -> CommodityRequest {
    serde_json::from_value(json!({
        "id": 7,
        "commodity": 2,
        "commodity_name": "ORS",
        "commodity_unit": "sachets",
        "quantity_requested": quantity_requested,
        "status": "PENDING",
        "requester_name": "Amina Otieno",
        "created_at": "2025-03-04T08:15:00Z"
    }))
    .unwrap()
}

#[tokio::test]
async fn approval_without_quantity_grants_requested_amount() {
    let (mut server, auth) = setup().await;
    auth.client().session().save("live", "refresh-1").await.unwrap();

    let update = server
        .mock("PUT", "/api/requests/7/")
        .match_header("authorization", "Bearer live")
        .match_body(Matcher::Json(json!({
            "status": "APPROVED",
            "notes": "",
            "quantity_approved": 40
        })))
        .with_status(200)
        .with_body(r#"{"id": 7, "status": "APPROVED", "quantity_approved": 40}"#)
        .expect(1)
        .create_async()
        .await;

    let draft = ReviewDraft {
        action: Some(ReviewAction::Approved),
        ..Default::default()
    };
    let updated = submit_review(auth.client(), 7, &draft, Some(&pending_request(40)))
        .await
        .unwrap();
    assert_eq!(updated["quantity_approved"], 40);
    update.assert_async().await;
}

#[tokio::test]
async fn approval_above_requested_amount_is_blocked_locally() {
    let (mut server, auth) = setup().await;

    let update = server
        .mock("PUT", "/api/requests/7/")
        .expect(0)
        .create_async()
        .await;

    let draft = ReviewDraft {
        action: Some(ReviewAction::Approved),
        quantity_approved: Some(5000),
        ..Default::default()
    };
    let err = submit_review(auth.client(), 7, &draft, Some(&pending_request(40)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Form(_)));
    assert_eq!(err.user_message(""), "Approved quantity cannot exceed the 40 requested");
    update.assert_async().await;
}
