//! Integration tests for the memo workflow over the real HTTP API.
//!
//! Each test spins up an Axum server on a random port over an in-memory
//! database seeded with a small university, then drives the approval
//! chain end to end with reqwest.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use uuid::Uuid;

use memoflow::auth::password::hash_password;
use memoflow::auth::session::SessionStore;
use memoflow::http::{AppState, router};
use memoflow::memos::workflow::WorkflowService;
use memoflow::notify::Notifier;
use memoflow::store::{AuditEntry, Database, LibSqlBackend};
use memoflow::users::model::{HrStaffRecord, UserRecord};

/// Maximum time any test is allowed to run before we consider it hung.
/// Generous because every seeded user costs a bcrypt hash.
const TEST_TIMEOUT: Duration = Duration::from_secs(30);

const PASSWORD: &str = "open sesame 42";

struct TestContext {
    base: String,
    client: reqwest::Client,
    db: Arc<dyn Database>,
    manager_id: Uuid,
    reviewer_id: Uuid,
    staff_id: Uuid,
    recipient_id: Uuid,
}

async fn seed_user(
    db: &Arc<dyn Database>,
    staff_no: &str,
    username: &str,
    email: &str,
    department: &str,
    roles: &[&str],
    line_manager_id: Option<Uuid>,
) -> Uuid {
    let now = Utc::now();
    let user = UserRecord {
        id: Uuid::new_v4(),
        staff_id: staff_no.to_string(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: hash_password(PASSWORD).unwrap(),
        department: department.to_string(),
        line_manager_id,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    let audit = AuditEntry::new(user.id, "CREATE_USER", "users", user.id);
    db.insert_user(&user, &roles, &audit).await.unwrap();
    user.id
}

/// Start a server over a freshly seeded in-memory database.
async fn start_server() -> TestContext {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());

    seed_user(
        &db,
        "CU-0001",
        "Amina",
        "admin@example.edu",
        "Registry",
        &["Administrator"],
        None,
    )
    .await;
    let manager_id = seed_user(
        &db,
        "CU-0002",
        "Musa",
        "manager@example.edu",
        "Registry",
        &["Line Manager"],
        None,
    )
    .await;
    let reviewer_id = seed_user(
        &db,
        "CU-0003",
        "Ngozi",
        "reviewer@example.edu",
        "Provost Office",
        &["Reviewer"],
        None,
    )
    .await;
    let staff_id = seed_user(
        &db,
        "CU-0004",
        "Tunde",
        "staff@example.edu",
        "Registry",
        &["Staff"],
        Some(manager_id),
    )
    .await;
    let recipient_id = seed_user(
        &db,
        "CU-0005",
        "Efe",
        "recipient@example.edu",
        "Bursary",
        &["Staff"],
        None,
    )
    .await;

    let notifier = Arc::new(Notifier::new(Arc::clone(&db), None));
    let workflow = Arc::new(WorkflowService::new(Arc::clone(&db), notifier));
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(600)));
    let app = router(AppState {
        db: Arc::clone(&db),
        sessions,
        workflow,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestContext {
        base: format!("http://127.0.0.1:{port}"),
        client: reqwest::Client::new(),
        db,
        manager_id,
        reviewer_id,
        staff_id,
        recipient_id,
    }
}

async fn login(ctx: &TestContext, email: &str) -> String {
    let response = ctx
        .client
        .post(format!("{}/api/auth/login", ctx.base))
        .json(&json!({"email": email, "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200, "login failed for {email}");
    let body: Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

async fn create_memo(ctx: &TestContext, token: &str, body: Value) -> Value {
    let response = ctx
        .client
        .post(format!("{}/api/memos", ctx.base))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201, "memo creation failed");
    response.json().await.unwrap()
}

fn approval_memo(recipients: &[Uuid]) -> Value {
    json!({
        "title": "Procurement of laboratory reagents",
        "content": "<p>Requesting approval for Q3 reagent procurement.</p>",
        "department": "Registry",
        "category": "Procurement",
        "priority": "High",
        "memo_type": "Approval",
        "recipient_ids": recipients,
        "attachments": [],
        "is_draft": false,
    })
}

/// First pending-approval entry for the given approver, as (memo_id, approval_id).
async fn current_task(ctx: &TestContext, token: &str) -> Option<(String, String)> {
    let body: Value = ctx
        .client
        .get(format!("{}/api/approvals", ctx.base))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = body.as_array()?.first()?;
    Some((
        entry["id"].as_str()?.to_string(),
        entry["approval_id"].as_str()?.to_string(),
    ))
}

async fn memo_status(ctx: &TestContext, token: &str, memo_id: &str) -> String {
    let body: Value = ctx
        .client
        .get(format!("{}/api/memos/{memo_id}", ctx.base))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["status"].as_str().unwrap().to_string()
}

// ── Auth ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_rejects_bad_credentials() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;

        let response = ctx
            .client
            .post(format!("{}/api/auth/login", ctx.base))
            .json(&json!({"email": "staff@example.edu", "password": "wrong"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);

        let response = ctx
            .client
            .get(format!("{}/api/memos/mine", ctx.base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401, "no token must be rejected");
    })
    .await
    .unwrap();
}

// ── The approval chain ───────────────────────────────────────────────

#[tokio::test]
async fn full_chain_approves_distributes_and_acknowledges() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;
        let staff = login(&ctx, "staff@example.edu").await;
        let manager = login(&ctx, "manager@example.edu").await;
        let reviewer = login(&ctx, "reviewer@example.edu").await;
        let recipient = login(&ctx, "recipient@example.edu").await;

        let created = create_memo(&ctx, &staff, approval_memo(&[ctx.recipient_id])).await;
        let memo_id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "Line Manager Review");
        assert!(
            created["reference_number"]
                .as_str()
                .unwrap()
                .starts_with("IMTS/"),
            "reference should carry the institutional prefix"
        );

        // Line manager's turn.
        let (task_memo, approval_id) = current_task(&ctx, &manager).await.expect("manager task");
        assert_eq!(task_memo, memo_id);
        let response = ctx
            .client
            .post(format!("{}/api/memos/{memo_id}/approve", ctx.base))
            .bearer_auth(&manager)
            .json(&json!({"approval_id": approval_id}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(memo_status(&ctx, &staff, &memo_id).await, "Reviewer Approval");

        // Reviewer's turn, surfaced only now.
        let (_, reviewer_approval) = current_task(&ctx, &reviewer).await.expect("reviewer task");
        let response = ctx
            .client
            .post(format!("{}/api/memos/{memo_id}/approve", ctx.base))
            .bearer_auth(&reviewer)
            .json(&json!({"approval_id": reviewer_approval}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(memo_status(&ctx, &staff, &memo_id).await, "Distributed");

        // Recipient sees it in the inbox and acknowledges.
        let inbox: Value = ctx
            .client
            .get(format!("{}/api/memos/inbox", ctx.base))
            .bearer_auth(&recipient)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(inbox.as_array().unwrap().len(), 1);
        assert_eq!(inbox[0]["id"], memo_id.as_str());

        let response = ctx
            .client
            .post(format!("{}/api/memos/{memo_id}/acknowledge", ctx.base))
            .bearer_auth(&recipient)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        // Creator was notified at distribution and at acknowledgment.
        let notifications: Value = ctx
            .client
            .get(format!("{}/api/notifications", ctx.base))
            .bearer_auth(&staff)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let messages: Vec<&str> = notifications
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["message"].as_str().unwrap())
            .collect();
        assert!(messages.iter().any(|m| m.contains("fully approved and distributed")));
        assert!(messages.iter().any(|m| m.contains("has acknowledged your memo")));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn rejection_resets_the_memo_to_draft() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;
        let staff = login(&ctx, "staff@example.edu").await;
        let manager = login(&ctx, "manager@example.edu").await;

        let created = create_memo(&ctx, &staff, approval_memo(&[ctx.recipient_id])).await;
        let memo_id = created["id"].as_str().unwrap().to_string();

        let (_, approval_id) = current_task(&ctx, &manager).await.expect("manager task");
        let response = ctx
            .client
            .post(format!("{}/api/memos/{memo_id}/reject", ctx.base))
            .bearer_auth(&manager)
            .json(&json!({"approval_id": approval_id, "comments": "Budget code missing"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(memo_status(&ctx, &staff, &memo_id).await, "Draft");

        // The reviewer's later step must no longer be actionable.
        let reviewer = login(&ctx, "reviewer@example.edu").await;
        assert!(current_task(&ctx, &reviewer).await.is_none());

        let notifications: Value = ctx
            .client
            .get(format!("{}/api/notifications", ctx.base))
            .bearer_auth(&staff)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(
            notifications
                .as_array()
                .unwrap()
                .iter()
                .any(|n| n["message"].as_str().unwrap().contains("rejected")),
            "creator should be told about the rejection"
        );
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn out_of_turn_decisions_are_refused() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;
        let staff = login(&ctx, "staff@example.edu").await;
        let manager = login(&ctx, "manager@example.edu").await;
        let reviewer = login(&ctx, "reviewer@example.edu").await;

        let created = create_memo(&ctx, &staff, approval_memo(&[ctx.recipient_id])).await;
        let memo_id = created["id"].as_str().unwrap().to_string();

        // The reviewer's own step exists but is not current yet.
        let detail: Value = ctx
            .client
            .get(format!("{}/api/memos/{memo_id}", ctx.base))
            .bearer_auth(&staff)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let approvals = detail["approvals"].as_array().unwrap();
        assert_eq!(approvals.len(), 2);
        let reviewer_step = approvals
            .iter()
            .find(|a| a["approver_id"] == ctx.reviewer_id.to_string())
            .unwrap();

        let response = ctx
            .client
            .post(format!("{}/api/memos/{memo_id}/approve", ctx.base))
            .bearer_auth(&reviewer)
            .json(&json!({"approval_id": reviewer_step["id"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 409, "skipping the manager step must fail");

        // The manager step cannot be decided by someone else.
        let manager_step = approvals
            .iter()
            .find(|a| a["approver_id"] == ctx.manager_id.to_string())
            .unwrap();
        let response = ctx
            .client
            .post(format!("{}/api/memos/{memo_id}/approve", ctx.base))
            .bearer_auth(&reviewer)
            .json(&json!({"approval_id": manager_step["id"]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 403);

        // Double-approval of the same step is refused.
        let (_, approval_id) = current_task(&ctx, &manager).await.unwrap();
        for expected in [200, 409] {
            let response = ctx
                .client
                .post(format!("{}/api/memos/{memo_id}/approve", ctx.base))
                .bearer_auth(&manager)
                .json(&json!({"approval_id": approval_id}))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn drafts_have_no_approval_chain() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;
        let staff = login(&ctx, "staff@example.edu").await;
        let manager = login(&ctx, "manager@example.edu").await;

        let mut body = approval_memo(&[]);
        body["is_draft"] = json!(true);
        let created = create_memo(&ctx, &staff, body).await;
        assert_eq!(created["status"], "Draft");

        assert!(current_task(&ctx, &manager).await.is_none());

        let memo_id = created["id"].as_str().unwrap();
        let detail: Value = ctx
            .client
            .get(format!("{}/api/memos/{memo_id}", ctx.base))
            .bearer_auth(&staff)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(detail["approvals"].as_array().unwrap().is_empty());
        assert_eq!(detail["viewer"]["is_creator"], true);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn line_manager_creator_starts_at_reviewer_step() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;
        let manager = login(&ctx, "manager@example.edu").await;

        let created = create_memo(&ctx, &manager, approval_memo(&[ctx.recipient_id])).await;
        assert_eq!(created["status"], "Reviewer Approval");

        let reviewer = login(&ctx, "reviewer@example.edu").await;
        let (task_memo, _) = current_task(&ctx, &reviewer).await.expect("reviewer task");
        assert_eq!(task_memo, created["id"].as_str().unwrap());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn hr_feed_resolves_the_line_manager_fallback() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;

        // The recipient user has no explicit manager; wire one through HR.
        ctx.db
            .upsert_hr_staff(&HrStaffRecord {
                staff_id: "CU-0005".into(),
                first_name: "Efe".into(),
                middle_name: None,
                surname: "Obi".into(),
                official_email: "recipient@example.edu".into(),
                department_code: "BUR".into(),
                line_manager_staff_id: Some("CU-0002".into()),
                is_active: true,
            })
            .await
            .unwrap();

        let creator = login(&ctx, "recipient@example.edu").await;
        let created = create_memo(&ctx, &creator, approval_memo(&[ctx.staff_id])).await;
        assert_eq!(created["status"], "Line Manager Review");

        let memo_id = created["id"].as_str().unwrap();
        let detail: Value = ctx
            .client
            .get(format!("{}/api/memos/{memo_id}", ctx.base))
            .bearer_auth(&creator)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            detail["approvals"][0]["approver_id"],
            ctx.manager_id.to_string()
        );
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn informational_memo_without_manager_distributes_immediately() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;
        // The recipient user has neither an explicit manager nor an HR row.
        let creator = login(&ctx, "recipient@example.edu").await;

        let mut body = approval_memo(&[ctx.staff_id]);
        body["memo_type"] = json!("Informational");
        let created = create_memo(&ctx, &creator, body).await;
        assert_eq!(created["status"], "Distributed");
    })
    .await
    .unwrap();
}

// ── Authorization and search ─────────────────────────────────────────

#[tokio::test]
async fn admin_routes_require_the_administrator_role() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;
        let staff = login(&ctx, "staff@example.edu").await;
        let admin = login(&ctx, "admin@example.edu").await;

        let response = ctx
            .client
            .get(format!("{}/api/users", ctx.base))
            .bearer_auth(&staff)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 403);

        let response = ctx
            .client
            .get(format!("{}/api/users", ctx.base))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let directory: Value = response.json().await.unwrap();
        assert_eq!(directory.as_array().unwrap().len(), 5);

        // Staff's manager is resolved from the explicit assignment.
        let staff_entry = directory
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["staff_id"] == "CU-0004")
            .unwrap();
        assert_eq!(staff_entry["manager_name"], "Musa");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn search_is_scoped_to_participants() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;
        let staff = login(&ctx, "staff@example.edu").await;
        let outsider = login(&ctx, "admin@example.edu").await;

        create_memo(&ctx, &staff, approval_memo(&[ctx.recipient_id])).await;

        let hits: Value = ctx
            .client
            .get(format!("{}/api/search?q=reagents", ctx.base))
            .bearer_auth(&staff)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(hits["results"].as_array().unwrap().len(), 1);

        // The admin is not creator, recipient, or approver of this memo.
        let hits: Value = ctx
            .client
            .get(format!("{}/api/search?q=reagents", ctx.base))
            .bearer_auth(&outsider)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(hits["results"].as_array().unwrap().is_empty());

        // Short terms return nothing.
        let hits: Value = ctx
            .client
            .get(format!("{}/api/search?q=re", ctx.base))
            .bearer_auth(&staff)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(hits["results"].as_array().unwrap().is_empty());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn reference_numbers_increment_within_a_department() {
    timeout(TEST_TIMEOUT, async {
        let ctx = start_server().await;
        let staff = login(&ctx, "staff@example.edu").await;

        let first = create_memo(&ctx, &staff, approval_memo(&[])).await;
        let second = create_memo(&ctx, &staff, approval_memo(&[])).await;

        let first_ref = first["reference_number"].as_str().unwrap();
        let second_ref = second["reference_number"].as_str().unwrap();
        assert!(first_ref.ends_with("/001"), "got {first_ref}");
        assert!(second_ref.ends_with("/002"), "got {second_ref}");
    })
    .await
    .unwrap();
}
