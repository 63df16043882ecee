//! End-to-end tests for the taskmaster HTTP API.
//!
//! Each test serves the real router on an ephemeral port with the in-memory
//! store and drives it over HTTP.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use reqwest::{Client, StatusCode, header::WWW_AUTHENTICATE};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc};
use taskmaster::{
    APP_USER_AGENT,
    api::{self, AppState},
    auth::{PasswordHasher, SigningKey, TokenCodec},
    store::Stores,
};
use tokio::net::TcpListener;

const ADMIN_PASSWORD: &str = "admin-pw";

struct TestServer {
    base: String,
    client: Client,
}

impl TestServer {
    async fn start() -> Result<Self> {
        let codec = Arc::new(TokenCodec::new(SigningKey::generate()?, 3600));
        let hasher = PasswordHasher::insecure_for_tests()?;
        let state = Arc::new(AppState::new(Stores::memory(), hasher, codec));
        state
            .authenticator
            .bootstrap_admin(
                "admin",
                "admin@x.com",
                &SecretString::from(ADMIN_PASSWORD.to_string()),
            )
            .await?;

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let app = api::router(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });

        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;
        Ok(Self {
            base: format!("http://{addr}"),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).with_context(|| format!("non-JSON body: {text}"))?
        };
        Ok((status, value))
    }

    async fn register(&self, username: &str, email: &str, password: &str) -> Result<(StatusCode, Value)> {
        self.send(
            reqwest::Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"username": username, "email": email, "password": password})),
        )
        .await
    }

    async fn login(&self, identifier: &str, password: &str) -> Result<(StatusCode, Value)> {
        self.send(
            reqwest::Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"login_identifier": identifier, "password": password})),
        )
        .await
    }

    async fn token_for(&self, identifier: &str, password: &str) -> Result<String> {
        let (status, body) = self.login(identifier, password).await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .context("missing access_token")
    }
}

fn token_claims(token: &str) -> Result<Value> {
    let payload = token.split('.').nth(1).context("token has no payload")?;
    let bytes = Base64UrlUnpadded::decode_vec(payload).map_err(|err| anyhow::anyhow!("{err}"))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn registration_login_and_ownership_scenario() -> Result<()> {
    use reqwest::Method;

    let server = TestServer::start().await?;

    // register alice
    let (status, alice) = server.register("alice", "alice@x.com", "pw1").await?;
    assert_eq!(status, StatusCode::CREATED, "{alice}");
    assert_eq!(alice["role"], "USER");
    assert_eq!(alice["token_type"], "Bearer");
    let alice_id = alice["user_id"].as_str().context("user_id")?.to_string();

    // same email, other username
    let (status, body) = server.register("alice2", "alice@x.com", "pw2").await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email is already in use");

    // wrong password
    let (status, body) = server.login("alice@x.com", "wrong").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid username/email or password");

    // correct password
    let (status, body) = server.login("alice@x.com", "pw1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "USER");
    let alice_token = body["access_token"].as_str().context("token")?.to_string();
    let claims = token_claims(&alice_token)?;
    assert_eq!(claims["userId"], alice_id.as_str());
    assert_eq!(claims["role"], "USER");
    assert_eq!(claims["sub"], "alice");

    // alice creates a task
    let (status, task) = server
        .send(
            Method::POST,
            "/api/tasks",
            Some(&alice_token),
            Some(json!({"title": "Write report", "priority": "HIGH"})),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    assert_eq!(task["owner_id"], alice_id.as_str());
    assert_eq!(task["completed"], false);
    let task_path = format!("/api/tasks/{}", task["id"].as_str().context("task id")?);

    // bob cannot see or touch it, and cannot tell it exists
    server.register("bob", "bob@x.com", "pw2").await?;
    let bob_token = server.token_for("bob", "pw2").await?;
    let (status, _) = server.send(Method::GET, &task_path, Some(&bob_token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server
        .send(
            Method::PUT,
            &task_path,
            Some(&bob_token),
            Some(json!({"title": "Hijacked"})),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.send(Method::DELETE, &task_path, Some(&bob_token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server
        .send(
            Method::GET,
            &format!("/api/tasks/user/{alice_id}"),
            Some(&bob_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server
        .send(Method::GET, "/api/admin/users", Some(&bob_token), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // admin reads alice's task
    let admin_token = server.token_for("admin@x.com", ADMIN_PASSWORD).await?;
    let (status, body) = server.send(Method::GET, &task_path, Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Write report");

    // owner update keeps ownership
    let (status, body) = server
        .send(
            Method::PUT,
            &task_path,
            Some(&alice_token),
            Some(json!({"title": "Write final report", "completed": true})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["owner_id"], alice_id.as_str());
    assert_eq!(body["completed"], true);
    assert_eq!(body["priority"], "HIGH");

    let (status, body) = server
        .send(Method::GET, "/api/tasks/user/my-tasks", Some(&alice_token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn role_assignment_takes_effect_on_next_request() -> Result<()> {
    use reqwest::Method;

    let server = TestServer::start().await?;
    let (_, alice) = server.register("alice", "alice@x.com", "pw1").await?;
    let alice_token = alice["access_token"].as_str().context("token")?.to_string();
    let (_, bob) = server.register("bob", "bob@x.com", "pw2").await?;
    let bob_id = bob["user_id"].as_str().context("user_id")?.to_string();
    let bob_token = bob["access_token"].as_str().context("token")?.to_string();
    let admin_token = server.token_for("admin", ADMIN_PASSWORD).await?;

    let (status, _) = server
        .send(
            Method::PUT,
            &format!("/api/admin/users/{bob_id}/assign-role/admin"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = server
        .send(
            Method::PUT,
            &format!("/api/admin/users/{bob_id}/assign-role/superuser"),
            Some(&admin_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Invalid role: superuser. Valid roles are USER, ADMIN."
    );

    let (status, _) = server
        .send(
            Method::PUT,
            &format!("/api/admin/users/{}/assign-role/ADMIN", uuid::Uuid::new_v4()),
            Some(&admin_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .send(
            Method::PUT,
            &format!("/api/admin/users/{bob_id}/assign-role/admin"),
            Some(&admin_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "ADMIN");

    // bob's old token still says USER, the store says ADMIN
    let (status, body) = server
        .send(Method::GET, "/api/admin/users", Some(&bob_token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(3));

    Ok(())
}

#[tokio::test]
async fn deleting_an_account_revokes_access_and_tasks() -> Result<()> {
    use reqwest::Method;

    let server = TestServer::start().await?;
    let (_, alice) = server.register("alice", "alice@x.com", "pw1").await?;
    let alice_id = alice["user_id"].as_str().context("user_id")?.to_string();
    let alice_token = alice["access_token"].as_str().context("token")?.to_string();
    let (_, bob) = server.register("bob", "bob@x.com", "pw2").await?;
    let bob_token = bob["access_token"].as_str().context("token")?.to_string();

    server
        .send(
            Method::POST,
            "/api/tasks",
            Some(&alice_token),
            Some(json!({"title": "Doomed"})),
        )
        .await?;

    let user_path = format!("/api/users/{alice_id}");
    let (status, _) = server.send(Method::DELETE, &user_path, Some(&bob_token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.send(Method::DELETE, &user_path, Some(&alice_token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = server
        .send(Method::GET, "/api/users/me", Some(&alice_token), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin_token = server.token_for("admin", ADMIN_PASSWORD).await?;
    let (status, body) = server
        .send(Method::GET, "/api/admin/tasks", Some(&admin_token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(0));

    Ok(())
}

#[tokio::test]
async fn rejects_unauthenticated_and_invalid_input() -> Result<()> {
    let server = TestServer::start().await?;

    let response = server.client.get(server.url("/api/users/me")).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok()),
        Some("Bearer")
    );

    let (status, body) = server.register("al", "not-an-email", "").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    for field in ["username", "email", "password"] {
        assert!(body["validation_errors"][field].is_string(), "{field}");
    }

    let (_, alice) = server.register("alice", "alice@x.com", "pw1").await?;
    let token = alice["access_token"].as_str().context("token")?.to_string();
    let (status, body) = server
        .send(
            reqwest::Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "x", "due_date": "2000-01-01T00:00:00Z"})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["validation_errors"]["title"].is_string());
    assert!(body["validation_errors"]["due_date"].is_string());

    let response = server.client.get(server.url("/health")).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let health: Value = response.json().await?;
    assert_eq!(health["store"], "ok");

    Ok(())
}
