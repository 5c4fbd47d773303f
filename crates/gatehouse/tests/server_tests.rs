//! End-to-end behaviour of the gateway endpoints
//!
//! Most tests drive the router directly with `oneshot`; forwarding tests
//! point routes at a real loopback backend.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{StatusCode, header},
};
use common::*;
use gatehouse::{GatewayServer, GatewayState, Keeper, StatsKeeper, UserStats};
use gatehouse_auth::{JwtTokenService, TokenService};
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::ServiceExt;

// Session creation

#[tokio::test]
async fn test_session_create_issues_valid_token() {
    let gw = TestGateway::new(FixedRoutes::default());

    let response = gw
        .router()
        .oneshot(request("GET", "/session/create", Some(&basic_auth("bob", "hunter2"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap();
    assert_eq!(gw.tokens.validate_token(token), Some("bob".to_string()));

    let stats = gw.stats.snapshot("bob").unwrap();
    assert_eq!(stats.authorized, 1);
    assert_eq!(stats.unauthorized, 0);
    assert!(stats.last_success.is_some());
}

#[tokio::test]
async fn test_session_create_unknown_user() {
    let gw = TestGateway::new(FixedRoutes::default());

    let response = gw
        .router()
        .oneshot(request("GET", "/session/create", Some(&basic_auth("eve", "anything"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(gw.stats.snapshot("eve"), None);
    assert_eq!(gw.stats.snapshot("bob"), Some(UserStats::default()));
    assert_eq!(gw.stats.len(), 2);
}

#[tokio::test]
async fn test_session_create_wrong_password() {
    let gw = TestGateway::new(FixedRoutes::default());

    let response = gw
        .router()
        .oneshot(request("GET", "/session/create", Some(&basic_auth("bob", "hunter3"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let stats = gw.stats.snapshot("bob").unwrap();
    assert_eq!(stats.unauthorized, 1);
    assert_eq!(stats.authorized, 0);
    assert!(stats.last_failure.is_some());
    assert!(stats.last_success.is_none());
}

#[tokio::test]
async fn test_session_create_without_credentials() {
    let gw = TestGateway::new(FixedRoutes::default());

    for auth in [None, Some("Basic !!!"), Some("Bearer abc")] {
        let response = gw
            .router()
            .oneshot(request("GET", "/session/create", auth))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            r#"Basic realm="Restricted""#
        );
    }
    assert_eq!(gw.stats.snapshot("bob"), Some(UserStats::default()));
}

#[tokio::test]
async fn test_session_create_signing_failure() {
    let stats = Arc::new(Keeper::new(["bob"]));
    let state = GatewayState::new(
        Arc::new(FixedCredentials::default().with_user("bob", "hunter2")),
        Arc::new(FixedRoutes::default()),
        Arc::new(BrokenSigner),
        stats.clone(),
    )
    .unwrap();
    let router = GatewayServer::new("127.0.0.1:0".parse().unwrap(), state).router();

    let response = router
        .oneshot(request("GET", "/session/create", Some(&basic_auth("bob", "hunter2"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "internal_error", "error_description": "Internal error" })
    );
    assert_eq!(stats.snapshot("bob").unwrap().authorized, 0);
}

#[tokio::test]
async fn test_repeated_logins_are_counted() {
    let gw = TestGateway::new(FixedRoutes::default());

    for password in ["hunter2", "nope", "hunter2", "nope", "nope"] {
        gw.router()
            .oneshot(request("GET", "/session/create", Some(&basic_auth("bob", password))))
            .await
            .unwrap();
    }

    let stats = gw.stats.snapshot("bob").unwrap();
    assert_eq!(stats.authorized, 2);
    assert_eq!(stats.unauthorized, 3);
}

// Stats

#[tokio::test]
async fn test_stats_for_self() {
    let gw = TestGateway::new(FixedRoutes::default());
    let token = gw.token_for("bob");

    let response = gw
        .router()
        .oneshot(request("GET", "/session/bob/stats", Some(&bearer(&token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        body_json(response).await,
        json!({
            "last_successful_session_unix_time": null,
            "authorized_attempt": 0,
            "last_unsucessful_session_unix_time": null,
            "unauthorized_attempt": 0,
        })
    );
}

#[tokio::test]
async fn test_stats_for_other_user_forbidden() {
    let gw = TestGateway::new(FixedRoutes::default());
    let token = gw.token_for("bob");

    let response = gw
        .router()
        .oneshot(request("GET", "/session/alice/stats", Some(&bearer(&token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_stats_require_valid_bearer() {
    let gw = TestGateway::new(FixedRoutes::default());
    let foreign = JwtTokenService::new("some-other-key")
        .issue_token("bob")
        .unwrap();
    let own = gw.token_for("bob");

    let cases = [
        None,
        Some("Bearer".to_string()),
        Some(format!("Bearer {own} extra")),
        Some(format!("Token {own}")),
        Some(basic_auth("bob", "hunter2")),
        Some(bearer("not.a.token")),
        Some(bearer(&foreign)),
    ];

    for auth in cases {
        let response = gw
            .router()
            .oneshot(request("GET", "/session/bob/stats", auth.as_deref()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{auth:?}");
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}

#[tokio::test]
async fn test_expired_token_rejected_on_every_protected_route() {
    let gw = TestGateway::new(FixedRoutes::default().with_route(
        "db",
        "http://127.0.0.1:9",
        &["bob"],
    ));
    let expired = bearer(&expired_token_for("bob"));

    for uri in ["/session/bob/stats", "/proxy/db"] {
        let response = gw
            .router()
            .oneshot(request("GET", uri, Some(&expired)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}

#[tokio::test]
async fn test_stats_for_untracked_subject_is_internal_error() {
    let gw = TestGateway::new(FixedRoutes::default());
    let token = gw.token_for("ghost");

    let response = gw
        .router()
        .oneshot(request("GET", "/session/ghost/stats", Some(&bearer(&token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_session_token_reads_own_stats() {
    let gw = TestGateway::new(FixedRoutes::default());
    let router = gw.router();

    let response = router
        .clone()
        .oneshot(request("GET", "/session/create", Some(&basic_auth("alice", "wonderland"))))
        .await
        .unwrap();
    let token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = router
        .oneshot(request("GET", "/session/alice/stats", Some(&bearer(&token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["authorized_attempt"], 1);
    assert!(body["last_successful_session_unix_time"].is_i64());
}

// Proxy

#[tokio::test]
async fn test_proxy_route_not_allowed() {
    let gw = TestGateway::new(FixedRoutes::default().with_route("db", "http://127.0.0.1:1", &["bob"]));
    let token = gw.token_for("alice");

    let response = gw
        .router()
        .oneshot(request("GET", "/proxy/db", Some(&bearer(&token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(gw.state.proxies.is_empty());
}

#[tokio::test]
async fn test_proxy_unknown_route_without_allow_list_is_forbidden() {
    let gw = TestGateway::new(FixedRoutes::default());
    let token = gw.token_for("bob");

    let response = gw
        .router()
        .oneshot(request("GET", "/proxy/db", Some(&bearer(&token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_proxy_unresolvable_route() {
    let gw = TestGateway::new(FixedRoutes::default().allow("db", &["bob"]));
    let token = gw.token_for("bob");

    let response = gw
        .router()
        .oneshot(request("GET", "/proxy/db", Some(&bearer(&token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_proxy_invalid_destination() {
    let gw = TestGateway::new(FixedRoutes::default().with_route("db", "::not a url::", &["bob"]));
    let token = gw.token_for("bob");

    let response = gw
        .router()
        .oneshot(request("GET", "/proxy/db", Some(&bearer(&token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(gw.state.proxies.is_empty());
}

#[tokio::test]
async fn test_proxy_requires_bearer() {
    let gw = TestGateway::new(FixedRoutes::default().with_route("db", "http://127.0.0.1:1", &["bob"]));

    let response = gw
        .router()
        .oneshot(request("GET", "/proxy/db", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_proxy_forwards_to_destination_root() {
    let backend = spawn_echo_backend().await;
    let destination = format!("http://{backend}/base?tenant=7");
    let gw = TestGateway::new(FixedRoutes::default().with_route("echo", &destination, &["bob"]));
    let token = gw.token_for("bob");

    let response = gw
        .router()
        .oneshot(request(
            "GET",
            "/proxy/echo?page=2",
            Some(&bearer(&token)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers().get("x-backend").unwrap(), "echo");

    let seen = body_json(response).await;
    assert_eq!(seen["method"], "GET");
    assert_eq!(seen["path"], "/base/");
    assert_eq!(seen["query"], "tenant=7&page=2");
    assert_eq!(seen["host"], backend.to_string());
    assert_eq!(seen["forwarded_host"], "gate.example");
    assert_eq!(seen["authorization"], bearer(&token));
}

#[tokio::test]
async fn test_proxy_forwards_method_and_body() {
    let backend = spawn_echo_backend().await;
    let gw = TestGateway::new(FixedRoutes::default().with_route(
        "echo",
        &format!("http://{backend}"),
        &["bob"],
    ));
    let token = gw.token_for("bob");

    let request = Request::builder()
        .method("PUT")
        .uri("/proxy/echo")
        .header(header::HOST, "gate.example")
        .header(header::AUTHORIZATION, bearer(&token))
        .body(Body::from("payload"))
        .unwrap();

    let response = gw.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let seen = body_json(response).await;
    assert_eq!(seen["method"], "PUT");
    assert_eq!(seen["path"], "/");
    assert_eq!(seen["body"], "payload");
}

#[tokio::test]
async fn test_proxy_body_limit() {
    let backend = spawn_echo_backend().await;
    let mut gw = TestGateway::new(FixedRoutes::default().with_route(
        "echo",
        &format!("http://{backend}"),
        &["bob"],
    ));
    gw.state = gw.state.clone().with_body_limit(8);
    let token = gw.token_for("bob");

    let request = Request::builder()
        .method("POST")
        .uri("/proxy/echo")
        .header(header::AUTHORIZATION, bearer(&token))
        .body(Body::from(vec![b'x'; 64]))
        .unwrap();

    let response = gw.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_proxy_backend_down() {
    let dead = closed_port().await;
    let gw = TestGateway::new(FixedRoutes::default().with_route(
        "dead",
        &format!("http://{dead}"),
        &["bob"],
    ));
    let token = gw.token_for("bob");

    let response = gw
        .router()
        .oneshot(request("GET", "/proxy/dead", Some(&bearer(&token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_proxy_handles_are_cached_per_destination() {
    let backend = spawn_echo_backend().await;
    let destination = format!("http://{backend}");
    let gw = TestGateway::new(
        FixedRoutes::default()
            .with_route("a", &destination, &["bob"])
            .with_route("b", &destination, &["bob"])
            .with_route("c", &format!("{destination}/other"), &["bob"]),
    );
    let token = gw.token_for("bob");
    let router = gw.router();

    for target in ["a", "a", "b", "c"] {
        let response = router
            .clone()
            .oneshot(request("GET", &format!("/proxy/{target}"), Some(&bearer(&token))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    assert_eq!(gw.state.proxies.len(), 2);
}

// Full server over TCP

#[tokio::test]
async fn test_served_gateway_round_trip() {
    let backend = spawn_echo_backend().await;
    let gw = TestGateway::new(FixedRoutes::default().with_route(
        "echo",
        &format!("http://{backend}"),
        &["bob"],
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server = GatewayServer::new(addr, gw.state.clone());
    let handle = tokio::spawn(server.serve_on(listener, async {
        let _ = stopped.await;
    }));

    let client = reqwest::Client::new();
    let session = client
        .get(format!("http://{addr}/session/create"))
        .basic_auth("bob", Some("hunter2"))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let session: serde_json::Value = serde_json::from_slice(&session).unwrap();
    let token = session["token"].as_str().unwrap();

    let response = client
        .post(format!("http://{addr}/proxy/echo"))
        .bearer_auth(token)
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let seen: serde_json::Value = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(seen["body"], "hello");
    assert_eq!(seen["forwarded_host"], addr.to_string());
    assert_eq!(seen["forwarded_for"], "127.0.0.1");

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
