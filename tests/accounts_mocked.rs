/// Account operation and provisioning workflows against mocked backend APIs
use chronos_admin::accounts::{
    find_account, login_with_identification, promote_to_admin, reset_password, unblock,
};
use chronos_admin::auth_client::AuthClient;
use chronos_admin::config::Config;
use chronos_admin::identification::{Identification, Normalization};
use chronos_admin::models::Role;
use chronos_admin::provisioning::{AccountNaming, PlannedAccount, ProvisionAction, Provisioner};
use chronos_admin::resolver::IdentificationResolver;
use chronos_admin::rest_client::RestClient;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RPC_PATH: &str = "/rest/v1/rpc/get_email_by_identification";
const USER_ID: &str = "6f1c5a4e-9d0b-4b7a-8f55-0d7b1c2e3a4f";

fn create_test_config(supabase_url: String) -> Config {
    Config {
        supabase_url,
        anon_key: "anon-key".to_string(),
        service_role_key: Some("service-key".to_string()),
        database_url: None,
        normalization: Normalization::Exact,
        request_timeout: Duration::from_secs(5),
    }
}

fn id(raw: &str) -> Identification {
    Identification::parse(raw).unwrap()
}

fn auth_user(email: &str) -> Value {
    json!({
        "id": USER_ID,
        "email": email,
        "email_confirmed_at": "2024-03-01T12:00:00Z",
        "created_at": "2024-03-01T12:00:00Z",
        "last_sign_in_at": null
    })
}

fn profile(role: &str, identification: Option<&str>, blocked: bool) -> Value {
    json!({
        "id": USER_ID,
        "name": "Admin Barber 001",
        "role": role,
        "identification": identification,
        "is_blocked": blocked
    })
}

async fn mount_rpc(server: &MockServer, target: &str, emails: &[&str]) {
    let rows: Vec<Value> = emails.iter().map(|e| json!({ "email": e })).collect();
    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(body_json(json!({ "target_id": target })))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

async fn mount_users(server: &MockServer, users: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "users": users })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_with_identification() {
    let server = MockServer::start().await;
    mount_rpc(&server, "1", &["admin.barber.001@chronos.app"]).await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(body_json(json!({
            "email": "admin.barber.001@chronos.app",
            "password": "correct horse"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": auth_user("admin.barber.001@chronos.app")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let resolver = IdentificationResolver::new(RestClient::anonymous(&config).unwrap());
    let auth = AuthClient::new(&config).unwrap();

    let session = login_with_identification(&resolver, &auth, &id("1"), "correct horse")
        .await
        .unwrap();
    assert_eq!(
        session.user.email.as_deref(),
        Some("admin.barber.001@chronos.app")
    );
}

#[tokio::test]
async fn test_login_with_unknown_identification_is_not_found() {
    let server = MockServer::start().await;
    mount_rpc(&server, "999", &[]).await;

    let config = create_test_config(server.uri());
    let resolver = IdentificationResolver::new(RestClient::anonymous(&config).unwrap());
    let auth = AuthClient::new(&config).unwrap();

    let err = login_with_identification(&resolver, &auth, &id("999"), "whatever1")
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // No sign-in attempt was made.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() == RPC_PATH));
}

#[tokio::test]
async fn test_reset_password_with_generated_password() {
    let server = MockServer::start().await;
    mount_rpc(&server, "000000000", &["admin@chronos.barber"]).await;
    mount_users(&server, vec![auth_user("admin@chronos.barber")]).await;

    Mock::given(method("PUT"))
        .and(path(format!("/auth/v1/admin/users/{}", USER_ID)))
        .and(body_partial_json(json!({ "email_confirm": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_user("admin@chronos.barber")))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let resolver = IdentificationResolver::new(RestClient::service(&config).unwrap());
    let auth = AuthClient::new(&config).unwrap();

    let credential = reset_password(&resolver, &auth, &id("000000000"), None)
        .await
        .unwrap();
    assert_eq!(credential.email, "admin@chronos.barber");
    assert_eq!(credential.password.len(), 32);

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    let body: Value = serde_json::from_slice(&put.body).unwrap();
    assert_eq!(body["password"], json!(credential.password));
}

#[tokio::test]
async fn test_reset_password_rejects_short_password() {
    let server = MockServer::start().await;
    let config = create_test_config(server.uri());
    let resolver = IdentificationResolver::new(RestClient::service(&config).unwrap());
    let auth = AuthClient::new(&config).unwrap();

    let err = reset_password(&resolver, &auth, &id("1"), Some("short".to_string()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("at least 8"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_account_through_barber_record() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("identification", "eq.036"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/barbers"))
        .and(query_param("identification", "eq.036"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "profile_id": USER_ID,
            "identification": "036",
            "name": "João",
            "is_admin": false
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", USER_ID)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([profile("BARBER", None, false)])),
        )
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let rest = RestClient::service(&config).unwrap();

    let account = find_account(&rest, &id("036"), Normalization::Exact).await.unwrap().unwrap();
    assert_eq!(account.profile.role, Role::Barber);
    assert_eq!(
        account.barber.unwrap().identification.as_deref(),
        Some("036")
    );
}

#[tokio::test]
async fn test_find_account_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let rest = RestClient::service(&config).unwrap();

    assert!(find_account(&rest, &id("999"), Normalization::Exact).await.unwrap().is_none());
}

async fn mount_direct_profile(server: &MockServer, body: Value) {
    mount_stored_profile(server, "1", body).await;
}

async fn mount_stored_profile(server: &MockServer, stored: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("identification", format!("eq.{}", stored)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([body])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/barbers"))
        .and(query_param("identification", format!("eq.{}", stored)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/barbers"))
        .and(query_param("profile_id", format!("eq.{}", USER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_promote_to_admin_patches_role() {
    let server = MockServer::start().await;
    mount_direct_profile(&server, profile("BARBER", Some("1"), false)).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", USER_ID)))
        .and(body_json(json!({ "role": "ADMIN" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([profile("ADMIN", Some("1"), false)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let rest = RestClient::service(&config).unwrap();

    let updated = promote_to_admin(&rest, &id("1"), Normalization::Exact).await.unwrap();
    assert_eq!(updated.role, Role::Admin);
}

#[tokio::test]
async fn test_promote_existing_admin_is_noop() {
    let server = MockServer::start().await;
    mount_direct_profile(&server, profile("ADMIN", Some("1"), false)).await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let rest = RestClient::service(&config).unwrap();

    assert_eq!(
        promote_to_admin(&rest, &id("1"), Normalization::Exact).await.unwrap().role,
        Role::Admin
    );
}

#[tokio::test]
async fn test_unblock_clears_flag() {
    let server = MockServer::start().await;
    mount_direct_profile(&server, profile("ADMIN", Some("1"), true)).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(body_json(json!({ "is_blocked": false })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([profile("ADMIN", Some("1"), false)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let rest = RestClient::service(&config).unwrap();

    assert!(!unblock(&rest, &id("1"), Normalization::Exact).await.unwrap().is_blocked);
}

#[tokio::test]
async fn test_unblock_unknown_identification_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let rest = RestClient::service(&config).unwrap();

    assert!(unblock(&rest, &id("999"), Normalization::Exact).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_promote_and_unblock_apply_zero_padding() {
    let server = MockServer::start().await;
    mount_stored_profile(&server, "004", profile("BARBER", Some("004"), true)).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(body_json(json!({ "role": "ADMIN" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([profile("ADMIN", Some("004"), true)])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(body_json(json!({ "is_blocked": false })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([profile("BARBER", Some("004"), false)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        normalization: Normalization::ZeroPadded(3),
        ..create_test_config(server.uri())
    };
    let rest = RestClient::service(&config).unwrap();

    let account = find_account(&rest, &id("4"), config.normalization)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.profile.identification.as_deref(), Some("004"));

    let promoted = promote_to_admin(&rest, &id("4"), config.normalization)
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::Admin);

    let unblocked = unblock(&rest, &id("4"), config.normalization).await.unwrap();
    assert!(!unblocked.is_blocked);
}

#[tokio::test]
async fn test_find_account_rejects_barber_owned_by_other_profile() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("identification", "eq.7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([profile("ADMIN", Some("7"), false)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/barbers"))
        .and(query_param("identification", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "profile_id": "0b9e7f4a-2c1d-4e5f-9a8b-7c6d5e4f3a2b",
            "identification": "7",
            "name": "Outro",
            "is_admin": false
        }])))
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let rest = RestClient::service(&config).unwrap();

    let err = find_account(&rest, &id("7"), Normalization::Exact)
        .await
        .unwrap_err();
    assert!(err.is_integrity_violation());
}

fn provisioner(config: &Config) -> Provisioner {
    Provisioner::new(
        AuthClient::new(config).unwrap(),
        RestClient::service(config).unwrap(),
        config.normalization,
    )
}

#[tokio::test]
async fn test_provision_creates_user_and_profile() {
    let server = MockServer::start().await;
    mount_users(&server, vec![]).await;
    mount_rpc(&server, "1", &[]).await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .and(body_partial_json(json!({
            "email": "admin.barber.001@chronos.app",
            "email_confirm": true
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(auth_user("admin.barber.001@chronos.app")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", USER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(body_partial_json(json!({
            "id": USER_ID,
            "role": "ADMIN",
            "identification": "1",
            "is_blocked": false
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([profile("ADMIN", Some("1"), false)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let plan = AccountNaming::default()
        .plan(1..=1, Normalization::Exact)
        .unwrap();

    let summary = provisioner(&config).provision_all(&plan).await.unwrap();
    assert!(summary.failed.is_empty());
    assert_eq!(summary.provisioned.len(), 1);

    let report = &summary.provisioned[0];
    assert_eq!(report.action, ProvisionAction::Created);
    assert_eq!(report.credential.email, "admin.barber.001@chronos.app");
    assert_eq!(report.credential.password.len(), 32);
}

#[tokio::test]
async fn test_provision_existing_user_resets_and_fixes_profile() {
    let server = MockServer::start().await;
    mount_users(&server, vec![auth_user("admin@chronos.barber")]).await;
    mount_rpc(&server, "000000000", &["admin@chronos.barber"]).await;

    Mock::given(method("PUT"))
        .and(path(format!("/auth/v1/admin/users/{}", USER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_user("admin@chronos.barber")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", USER_ID)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([profile("CLIENT", Some("000000000"), true)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(body_json(json!({ "role": "ADMIN", "is_blocked": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([profile(
            "ADMIN",
            Some("000000000"),
            false
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let account = PlannedAccount::custom(id("000000000"), "admin@chronos.barber", "Super Admin")
        .unwrap();

    let summary = provisioner(&config).provision_all(&[account]).await.unwrap();
    assert!(summary.failed.is_empty());
    assert_eq!(summary.provisioned[0].action, ProvisionAction::Reset);
}

#[tokio::test]
async fn test_provision_refuses_identification_held_by_other_account() {
    let server = MockServer::start().await;
    mount_users(&server, vec![]).await;
    mount_rpc(&server, "2", &["someone.else@chronos.app"]).await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let plan = AccountNaming::default()
        .plan(2..=2, Normalization::Exact)
        .unwrap();

    let summary = provisioner(&config).provision_all(&plan).await.unwrap();
    assert!(summary.provisioned.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0.as_str(), "2");
    assert!(summary.failed[0].1.contains("someone.else@chronos.app"));
}

#[tokio::test]
async fn test_provision_continues_after_a_failure() {
    let server = MockServer::start().await;
    mount_users(&server, vec![]).await;
    mount_rpc(&server, "1", &["someone.else@chronos.app"]).await;
    mount_rpc(&server, "2", &[]).await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(auth_user("admin.barber.002@chronos.app")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([profile("ADMIN", Some("2"), false)])),
        )
        .mount(&server)
        .await;

    let config = create_test_config(server.uri());
    let plan = AccountNaming::default()
        .plan(1..=2, Normalization::Exact)
        .unwrap();

    let summary = provisioner(&config).provision_all(&plan).await.unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.provisioned.len(), 1);
    assert_eq!(
        summary.provisioned[0].credential.email,
        "admin.barber.002@chronos.app"
    );
}
