use chrono::{Duration as ChronoDuration, Utc};
use figura_auth::{JwtClaims, PrincipalId, Role};
use figura_core::{GroupId, LearnerId, SkillId, Subject, TenantId};
use figura_graph::{EdgeAttributes, EdgeKey, PrerequisiteEdge};
use figura_infra::refresh::RefreshConfig;
use figura_infra::sources::seed::{GroupSeed, ProgressSeed};
use figura_infra::sources::{SeedData, SkillSummary, TenantSeed};
use figura_suggestions::CompletionState;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(seed: &SeedData) -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let services = figura_api::app::AppServices::in_memory(Some(seed), RefreshConfig::default())
            .await
            .expect("failed to build services");
        let app = figura_api::app::build_app(JWT_SECRET.to_string(), services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, sub: PrincipalId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        tenant_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// A circus school: ATR-mur requires Gainage (weight 2) and Equilibre (weight 1);
/// Souplesse is optional. The learner has validated Gainage.
struct School {
    tenant: TenantId,
    learner: LearnerId,
    group: GroupId,
    atr: SkillId,
    gainage: SkillId,
    equilibre: SkillId,
    souplesse: SkillId,
    seed: SeedData,
}

impl School {
    fn new() -> Self {
        let tenant = TenantId::new();
        let learner = LearnerId::new();
        let group = GroupId::new();
        let (atr, gainage, equilibre, souplesse) = (SkillId::new(), SkillId::new(), SkillId::new(), SkillId::new());

        let edge = |p: SkillId, order: u32, required: bool, weight: u8| {
            PrerequisiteEdge::new(EdgeKey::new(atr, p), EdgeAttributes::new(order, required, weight))
        };

        let seed = SeedData {
            tenants: vec![TenantSeed {
                tenant_id: tenant,
                skills: vec![
                    SkillSummary::new(atr, "ATR-mur"),
                    SkillSummary::new(gainage, "Gainage"),
                    SkillSummary::new(equilibre, "Equilibre-mains"),
                    SkillSummary::new(souplesse, "Souplesse"),
                ],
                learners: vec![learner],
                groups: vec![GroupSeed { id: group, active: true }],
                progress: vec![ProgressSeed {
                    subject: Subject::Learner(learner),
                    skill_id: gainage,
                    state: CompletionState::Satisfied,
                }],
                prerequisites: vec![edge(gainage, 1, true, 2), edge(equilibre, 2, true, 1), edge(souplesse, 3, false, 1)],
            }],
        };

        Self {
            tenant,
            learner,
            group,
            atr,
            gainage,
            equilibre,
            souplesse,
            seed,
        }
    }

    fn admin_token(&self) -> String {
        mint_jwt(self.tenant, PrincipalId::new(), vec![Role::new(Role::ADMIN)])
    }

    fn learner_token(&self) -> String {
        mint_jwt(
            self.tenant,
            PrincipalId::from_uuid(*self.learner.as_uuid()),
            vec![Role::new(Role::LEARNER)],
        )
    }

    fn instructor_token(&self) -> String {
        mint_jwt(self.tenant, PrincipalId::new(), vec![Role::new(Role::INSTRUCTOR)])
    }

    fn service_token(&self) -> String {
        mint_jwt(self.tenant, PrincipalId::new(), vec![Role::new(Role::SERVICE)])
    }
}

async fn run_refresh(client: &reqwest::Client, srv: &TestServer, token: &str) -> serde_json::Value {
    let res = client
        .post(srv.url("/admin/refresh"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;

    let client = reqwest::Client::new();
    let res = client.get(srv.url("/suggestions")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/suggestions"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;

    let client = reqwest::Client::new();
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(school.admin_token())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), school.tenant.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn learner_sees_scores_and_decides() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;
    let client = reqwest::Client::new();
    let learner = school.learner_token();

    run_refresh(&client, &srv, &school.admin_token()).await;

    let res = client
        .get(srv.url("/suggestions"))
        .bearer_auth(&learner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list: serde_json::Value = res.json().await.unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["skill"]["name"], "ATR-mur");
    assert_eq!(list[0]["score"].as_f64(), Some(66.67));
    assert_eq!(list[0]["satisfied_count"], 1);
    assert_eq!(list[0]["required_total"], 2);
    assert_eq!(list[0]["status"], "pending");

    let res = client
        .get(srv.url(&format!("/suggestions/{}", school.atr)))
        .bearer_auth(&learner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let detail: serde_json::Value = res.json().await.unwrap();
    let rows = detail["prerequisites"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["skill"]["id"].as_str().unwrap(), school.gainage.to_string());
    assert_eq!(rows[0]["state"], "satisfied");
    assert_eq!(rows[1]["skill"]["id"].as_str().unwrap(), school.equilibre.to_string());
    assert_eq!(rows[1]["state"], "not_satisfied");
    assert_eq!(rows[2]["skill"]["id"].as_str().unwrap(), school.souplesse.to_string());
    assert_eq!(rows[2]["required"], false);

    let decide = |action: &'static str| {
        client
            .post(srv.url(&format!("/suggestions/{}/{}", school.atr, action)))
            .bearer_auth(&learner)
            .send()
    };

    let res = decide("accept").await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["outcome"], "applied");

    let body: serde_json::Value = decide("accept").await.unwrap().json().await.unwrap();
    assert_eq!(body["outcome"], "unchanged");

    let res = decide("dismiss").await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");

    let list: serde_json::Value = client
        .get(srv.url("/suggestions"))
        .bearer_auth(&learner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.as_array().unwrap().is_empty());

    // A later refresh leaves the decided entry alone.
    let summary = run_refresh(&client, &srv, &school.admin_token()).await;
    assert_eq!(summary["totals"]["skipped_decided"], 1);

    let body: serde_json::Value = decide("restore").await.unwrap().json().await.unwrap();
    assert_eq!(body["outcome"], "applied");
}

#[tokio::test]
async fn cycles_and_bad_edges_are_rejected() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;
    let client = reqwest::Client::new();
    let admin = school.admin_token();

    let add = |parent: SkillId, prerequisite: SkillId, weight: u8| {
        client
            .post(srv.url("/admin/prerequisites"))
            .bearer_auth(&admin)
            .json(&json!({
                "parent": parent,
                "prerequisite": prerequisite,
                "order": 1,
                "required": true,
                "weight": weight,
            }))
            .send()
    };

    // Gainage -> ATR-mur would close ATR-mur -> Gainage.
    let res = add(school.gainage, school.atr, 1).await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "cycle_detected");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("ATR-mur"), "{message}");
    assert!(message.contains("Gainage"), "{message}");

    let res = add(school.atr, school.atr, 1).await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = add(school.atr, school.gainage, 1).await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_edge");

    let res = add(school.atr, SkillId::new(), 1).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "skill_not_found");

    let res = add(school.souplesse, school.equilibre, 9).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = add(school.souplesse, school.equilibre, 3).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .get(srv.url(&format!("/admin/skills/{}/dependents", school.equilibre)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let dependents: serde_json::Value = res.json().await.unwrap();
    assert_eq!(dependents.as_array().unwrap().len(), 2);

    let res = client
        .delete(srv.url(&format!("/admin/prerequisites/{}/{}", school.souplesse, school.equilibre)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .delete(srv.url(&format!("/admin/prerequisites/{}/{}", school.souplesse, school.equilibre)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn prerequisites_are_listed_in_order_and_updatable() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;
    let client = reqwest::Client::new();
    let admin = school.admin_token();

    let res = client
        .put(srv.url(&format!("/admin/prerequisites/{}/{}", school.atr, school.gainage)))
        .bearer_auth(&admin)
        .json(&json!({ "order": 5, "required": true, "weight": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let edges: serde_json::Value = client
        .get(srv.url(&format!("/admin/prerequisites/{}", school.atr)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = edges
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["prerequisite"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Equilibre-mains", "Souplesse", "Gainage"]);
    assert_eq!(edges[2]["weight"], 3);

    let res = client
        .put(srv.url(&format!("/admin/prerequisites/{}/{}", school.atr, school.gainage)))
        .bearer_auth(&admin)
        .json(&json!({ "order": 0, "required": true, "weight": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn learners_cannot_use_admin_routes() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;
    let client = reqwest::Client::new();
    let learner = school.learner_token();

    let res = client
        .post(srv.url("/admin/prerequisites"))
        .bearer_auth(&learner)
        .json(&json!({ "parent": school.souplesse, "prerequisite": school.gainage }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url("/admin/refresh"))
        .bearer_auth(&learner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url(&format!("/groups/{}/suggestions", school.group)))
        .bearer_auth(&learner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn instructors_manage_group_suggestions() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;
    let client = reqwest::Client::new();
    let instructor = school.instructor_token();

    run_refresh(&client, &srv, &school.admin_token()).await;

    let list: serde_json::Value = client
        .get(srv.url(&format!("/groups/{}/suggestions", school.group)))
        .bearer_auth(&instructor)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    // The group has no progress yet.
    assert_eq!(list[0]["score"].as_f64(), Some(0.0));

    let res = client
        .post(srv.url(&format!("/groups/{}/suggestions/{}/dismiss", school.group, school.atr)))
        .bearer_auth(&instructor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/groups/{}/suggestions", GroupId::new())))
        .bearer_auth(&instructor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "subject_not_found");
}

#[tokio::test]
async fn plan_events_accept_and_reset() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;
    let client = reqwest::Client::new();
    let service = school.service_token();

    run_refresh(&client, &srv, &school.admin_token()).await;

    let post = |skill: SkillId, change: &'static str| {
        client
            .post(srv.url("/plan-events"))
            .bearer_auth(&service)
            .json(&json!({
                "subject": { "kind": "learner", "id": school.learner },
                "skill_id": skill,
                "change": change,
            }))
            .send()
    };

    let body: serde_json::Value = post(school.atr, "added").await.unwrap().json().await.unwrap();
    assert_eq!(body["outcome"], "applied");

    let body: serde_json::Value = post(school.atr, "removed").await.unwrap().json().await.unwrap();
    assert_eq!(body["outcome"], "applied");

    // Never suggested: still recorded so it is not proposed later.
    let body: serde_json::Value = post(school.souplesse, "added").await.unwrap().json().await.unwrap();
    assert_eq!(body["outcome"], "applied");
    let body: serde_json::Value = post(school.souplesse, "added").await.unwrap().json().await.unwrap();
    assert_eq!(body["outcome"], "unchanged");
}

#[tokio::test]
async fn tenant_isolation_blocks_cross_tenant_access() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;
    let client = reqwest::Client::new();

    run_refresh(&client, &srv, &school.admin_token()).await;

    let intruder = mint_jwt(TenantId::new(), PrincipalId::new(), vec![Role::new(Role::ADMIN)]);

    let res = client
        .get(srv.url(&format!("/admin/prerequisites/{}", school.atr)))
        .bearer_auth(&intruder)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url(&format!("/groups/{}/suggestions/{}/accept", school.group, school.atr)))
        .bearer_auth(&intruder)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let summary: serde_json::Value = client
        .get(srv.url("/admin/refresh/summary"))
        .bearer_auth(&intruder)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(summary["outcomes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn refresh_summary_is_available_after_a_run() {
    let school = School::new();
    let srv = TestServer::spawn(&school.seed).await;
    let client = reqwest::Client::new();
    let admin = school.admin_token();

    let res = client
        .get(srv.url("/admin/refresh/summary"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    run_refresh(&client, &srv, &admin).await;

    let res = client
        .get(srv.url("/admin/refresh/summary"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: serde_json::Value = res.json().await.unwrap();
    // Learner and group.
    assert_eq!(summary["totals"]["subjects_processed"], 2);
    assert_eq!(summary["totals"]["created"], 2);
}
