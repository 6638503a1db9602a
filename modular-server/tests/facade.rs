//! End-to-end tests: a real facade in front of a stub backend, driven
//! through the SDK the same way the CLI drives production servers.

use std::{convert::Infallible, net::SocketAddr, path::Path};

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use modular_sdk::Client;
use modular_system::{
    AuditStore, Config, GroupStore, IntegrityService, Mode, PolicyStore, UserStore,
};
use modular_types::{
    audit::AuditQuery,
    module::CommandNode,
    policy::{Effect, Statement},
};
use serde_json::json;
use tokio::sync::oneshot;

const SECRET_KEY: &str = "integration-test-secret";

async fn handle_backend(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let body = match (req.method().as_str(), req.uri().path()) {
        ("POST", "/aws") => json!({"service": "aws"}),
        ("POST", "/azure") => json!({"service": "azure"}),
        ("GET", "/tenant/describe") => json!({"tenants": []}),
        _ => {
            return Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::empty())
                .expect("a valid response"))
        }
    };
    Ok(Response::builder()
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("a valid response"))
}

async fn spawn_backend() -> SocketAddr {
    let make_svc =
        make_service_fn(|_| async { Ok::<_, Infallible>(service_fn(handle_backend)) });
    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

fn write_m3admin_module(dir: &Path, service_url: &str) {
    let module_dir = dir.join("m3admin");
    std::fs::create_dir_all(&module_dir).expect("module dir");
    std::fs::write(
        module_dir.join("module.json"),
        json!({
            "module_name": "m3admin",
            "version": "3.0.0",
            "cli_path": "commands.json",
            "mount_point": "/m3admin",
            "dependencies": []
        })
        .to_string(),
    )
    .expect("descriptor");
    std::fs::write(
        module_dir.join("commands.json"),
        json!({
            "description": "tenant administration",
            "service_url": service_url,
            "commands": [
                {
                    "kind": "command",
                    "name": "aws",
                    "route": {"method": "POST", "path": "/aws"}
                },
                {
                    "kind": "command",
                    "name": "azure",
                    "route": {"method": "POST", "path": "/azure"}
                },
                {
                    "kind": "group",
                    "name": "tenant",
                    "children": [
                        {
                            "kind": "command",
                            "name": "describe",
                            "describe": true,
                            "parameters": [
                                {"name": "region", "type": "string", "required": false}
                            ],
                            "route": {"method": "GET", "path": "/tenant/describe"}
                        }
                    ]
                }
            ]
        })
        .to_string(),
    )
    .expect("command tree");
}

fn config(root: &Path, port_tx: oneshot::Sender<u16>) -> Config {
    Config {
        port: 0,
        port_tx: Some(port_tx),
        secret_key: SECRET_KEY.to_string(),
        mode: Mode::SelfHosted,
        database_uri: None,
        database_path: Some(root.join("modular.db").display().to_string()),
        modules_path: root.join("modules").display().to_string(),
        calls_per_second_limit: Some(2),
        min_cli_version: Some(semver_version("0.1.0")),
        enable_private_mode: false,
        log_path: None,
        upstream_timeout_secs: 10,
        secret_store_addr: None,
        secret_store_token: None,
    }
}

fn semver_version(raw: &str) -> semver::Version {
    semver::Version::parse(raw).expect("a valid version")
}

struct Facade {
    url: String,
    users: UserStore,
    groups: GroupStore,
    policies: PolicyStore,
    audit: AuditStore,
    _root: tempfile::TempDir,
}

async fn spawn_facade() -> Facade {
    let root = tempfile::tempdir().expect("tempdir");
    let backend = spawn_backend().await;
    write_m3admin_module(
        &root.path().join("modules"),
        &format!("http://{backend}"),
    );

    let (port_tx, port_rx) = oneshot::channel();
    let server_config = config(root.path(), port_tx);
    tokio::spawn(async move {
        modular_system::start(server_config, std::future::pending::<()>())
            .await
            .expect("facade runs");
    });
    let port = port_rx.await.expect("bound port");

    // The administrator surface shares the same document store.
    let (unused_tx, _unused_rx) = oneshot::channel();
    let admin_config = config(root.path(), unused_tx);
    let repos = modular_system::open_repos(&admin_config)
        .await
        .expect("admin repos");
    let integrity = IntegrityService::new(SECRET_KEY.as_bytes());

    Facade {
        url: format!("http://127.0.0.1:{port}"),
        users: UserStore::new(repos.clone(), integrity.clone()),
        groups: GroupStore::new(repos.clone(), integrity.clone()),
        policies: PolicyStore::new(repos.clone(), integrity.clone()),
        audit: AuditStore::new(repos, integrity),
        _root: root,
    }
}

fn allow(resources: &[&str]) -> Statement {
    Statement {
        effect: Effect::Allow,
        module: "m3admin".into(),
        resources: resources.iter().map(|r| r.parse().expect("pattern")).collect(),
        description: None,
    }
}

fn deny(resources: &[&str]) -> Statement {
    Statement {
        effect: Effect::Deny,
        ..allow(resources)
    }
}

#[tokio::test]
async fn health_check_is_public() {
    let facade = spawn_facade().await;
    let sdk = Client::new(&facade.url);
    let health = sdk.status.health_check().await.expect("health");
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn allow_and_deny_precedence() {
    let facade = spawn_facade().await;

    facade
        .policies
        .create("p1", vec![allow(&["aws"])])
        .await
        .expect("policy");
    facade
        .groups
        .create("g1", vec!["p1".into()])
        .await
        .expect("group");
    facade
        .users
        .create("alice", Some("pw".into()), vec!["g1".into()])
        .await
        .expect("user");

    let sdk = Client::new(&facade.url);
    let login = sdk.auth.login("alice", "pw", true).await.expect("login");
    sdk.set_token(Some(login.token.to_string())).await;

    // The login catalog only shows commands the caller may invoke.
    assert_eq!(login.catalog.modules.len(), 1);
    let visible = login.catalog.modules[0]
        .commands
        .iter()
        .map(CommandNode::name)
        .collect::<Vec<_>>();
    assert_eq!(visible, vec!["aws"]);

    let (status, body) = sdk
        .run
        .execute("POST", "/m3admin/aws", &[], None)
        .await
        .expect("dispatch");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"service": "aws"}));

    let (status, body) = sdk
        .run
        .execute("POST", "/m3admin/azure", &[], None)
        .await
        .expect("dispatch");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], json!("denied"));

    // The successful call is audited.
    let records = facade
        .audit
        .query(&AuditQuery {
            group: Some("m3admin".into()),
            ..AuditQuery::default()
        })
        .await
        .expect("audit");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record.command, "aws");

    // Adding a Deny for the same command flips the decision regardless of
    // the Allow.
    facade
        .policies
        .update("p1", vec![allow(&["aws"]), deny(&["aws"])])
        .await
        .expect("update");
    let (status, body) = sdk
        .run
        .execute("POST", "/m3admin/aws", &[], None)
        .await
        .expect("dispatch");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], json!("denied"));
}

#[tokio::test]
async fn restricted_values_are_enforced() {
    let facade = spawn_facade().await;

    facade
        .policies
        .create("p2", vec![allow(&["tenant:*"])])
        .await
        .expect("policy");
    facade
        .groups
        .create("g2", vec!["p2".into()])
        .await
        .expect("group");
    facade
        .users
        .create("bob", Some("pw".into()), vec!["g2".into()])
        .await
        .expect("user");
    facade
        .users
        .set_meta_attribute(
            "bob",
            "region",
            Some(vec!["eu-central-1".into(), "eu-west-1".into()]),
            None,
        )
        .await
        .expect("meta");

    let sdk = Client::new(&facade.url);
    let login = sdk.auth.login("bob", "pw", false).await.expect("login");
    sdk.set_token(Some(login.token.to_string())).await;

    let (status, _) = sdk
        .run
        .execute(
            "GET",
            "/m3admin/tenant/describe",
            &[("region".into(), "eu-central-1".into())],
            None,
        )
        .await
        .expect("dispatch");
    assert_eq!(status, StatusCode::OK);

    let (status, body) = sdk
        .run
        .execute(
            "GET",
            "/m3admin/tenant/describe",
            &[("region".into(), "us-east-1".into())],
            None,
        )
        .await
        .expect("dispatch");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], json!("restricted-value"));
}

#[tokio::test]
async fn rate_limiter_kicks_in() {
    let facade = spawn_facade().await;

    facade
        .policies
        .create("p3", vec![allow(&["aws"])])
        .await
        .expect("policy");
    facade
        .groups
        .create("g3", vec!["p3".into()])
        .await
        .expect("group");
    facade
        .users
        .create("carol", Some("pw".into()), vec!["g3".into()])
        .await
        .expect("user");

    let sdk = Client::new(&facade.url);
    let login = sdk.auth.login("carol", "pw", false).await.expect("login");
    sdk.set_token(Some(login.token.to_string())).await;

    // The ceiling is 2/s for (carol, /m3admin/aws); a fast burst must hit
    // the limiter.
    let mut limited = false;
    for _ in 0..20 {
        let (status, body) = sdk
            .run
            .execute("POST", "/m3admin/aws", &[], None)
            .await
            .expect("dispatch");
        if status == StatusCode::TOO_MANY_REQUESTS {
            assert_eq!(body["kind"], json!("rate-limited"));
            limited = true;
            break;
        }
        assert_eq!(status, StatusCode::OK);
    }
    assert!(limited, "20 rapid calls never hit the 2/s ceiling");
}

#[tokio::test]
async fn blocking_a_user_revokes_their_token() {
    let facade = spawn_facade().await;

    facade
        .policies
        .create("p4", vec![allow(&["aws"])])
        .await
        .expect("policy");
    facade
        .groups
        .create("g4", vec!["p4".into()])
        .await
        .expect("group");
    facade
        .users
        .create("dave", Some("pw".into()), vec!["g4".into()])
        .await
        .expect("user");

    let sdk = Client::new(&facade.url);
    let login = sdk.auth.login("dave", "pw", false).await.expect("login");
    sdk.set_token(Some(login.token.to_string())).await;

    let (status, _) = sdk
        .run
        .execute("POST", "/m3admin/aws", &[], None)
        .await
        .expect("dispatch");
    assert_eq!(status, StatusCode::OK);

    facade.users.block("dave", None).await.expect("block");

    let (status, body) = sdk
        .run
        .execute("POST", "/m3admin/aws", &[], None)
        .await
        .expect("dispatch");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], json!("token-revoked"));
}

#[tokio::test]
async fn logout_revokes_the_presented_token() {
    let facade = spawn_facade().await;
    facade
        .users
        .create("erin", Some("pw".into()), vec![])
        .await
        .expect("user");

    let sdk = Client::new(&facade.url);
    let login = sdk.auth.login("erin", "pw", false).await.expect("login");
    sdk.set_token(Some(login.token.to_string())).await;

    assert!(sdk.meta.describe().await.is_ok());
    let logout = sdk.auth.logout().await.expect("logout");
    assert!(logout.revoked);
    assert!(sdk.meta.describe().await.is_err());
}

#[tokio::test]
async fn version_gate_rejects_old_clients() {
    let facade = spawn_facade().await;

    let response = reqwest::Client::new()
        .get(format!("{}/health_check", facade.url))
        .header("modular-cli-version", "0.0.1")
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = reqwest::Client::new()
        .get(format!("{}/health_check", facade.url))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_routes_and_credentials() {
    let facade = spawn_facade().await;
    facade
        .users
        .create("frank", Some("pw".into()), vec![])
        .await
        .expect("user");

    let sdk = Client::new(&facade.url);
    assert!(sdk.auth.login("frank", "wrong", false).await.is_err());
    assert!(sdk.auth.login("nobody", "pw", false).await.is_err());

    let login = sdk.auth.login("frank", "pw", false).await.expect("login");
    sdk.set_token(Some(login.token.to_string())).await;
    let (status, body) = sdk
        .run
        .execute("POST", "/m3admin/unknown", &[], None)
        .await
        .expect("dispatch");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], json!("no-such-route"));
}
