//! End-to-end proxying through a running gateway.

use std::collections::HashSet;

use reqwest::StatusCode;
use serde_json::json;

mod common;

use common::{service, start_echo_backend, start_gateway, test_config, url};

#[tokio::test]
async fn test_strip_path_forwarding() {
    let backend = start_echo_backend().await;
    let target = format!("http://{backend}/base");
    let (gateway, _defs) = start_gateway(
        test_config(),
        json!([service("users", "/api/*", &[target], true, json!([]))]),
    )
    .await;

    let res = reqwest::get(url(&gateway, "/api/foo?x=1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.text().await.unwrap(),
        format!("/base/foo?x=1|{backend}")
    );

    gateway.shutdown();
    gateway.wait().await;
}

#[tokio::test]
async fn test_round_robin_across_backends() {
    let a = start_echo_backend().await;
    let b = start_echo_backend().await;
    let targets = vec![format!("http://{a}"), format!("http://{b}")];
    let (gateway, _defs) = start_gateway(
        test_config(),
        json!([service("svc", "/svc/*", &targets, true, json!([]))]),
    )
    .await;

    let mut hosts = Vec::new();
    for _ in 0..4 {
        let body = reqwest::get(url(&gateway, "/svc/x")).await.unwrap().text().await.unwrap();
        hosts.push(body.split('|').nth(1).unwrap().to_string());
    }

    assert_eq!(hosts[0], hosts[2]);
    assert_eq!(hosts[1], hosts[3]);
    assert_eq!(hosts.iter().collect::<HashSet<_>>().len(), 2);

    gateway.shutdown();
    gateway.wait().await;
}

#[tokio::test]
async fn test_inactive_and_unknown_paths_are_not_found() {
    let backend = start_echo_backend().await;
    let mut inactive = service("off", "/off/*", &[format!("http://{backend}")], false, json!([]));
    inactive["Active"] = json!(false);
    let (gateway, _defs) = start_gateway(test_config(), json!([inactive])).await;

    assert_eq!(gateway.report().skipped, vec!["off"]);

    for path in ["/off/anything", "/elsewhere"] {
        let res = reqwest::get(url(&gateway, path)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.text().await.unwrap(), "404 page not found\n");
    }

    gateway.shutdown();
    gateway.wait().await;
}

#[tokio::test]
async fn test_request_id_added_and_appended() {
    let backend = start_echo_backend().await;
    let (gateway, _defs) = start_gateway(
        test_config(),
        json!([service("svc", "/svc/*", &[format!("http://{backend}")], false, json!([]))]),
    )
    .await;
    let client = reqwest::Client::new();

    let fresh = client.get(url(&gateway, "/svc/a")).send().await.unwrap();
    let id = fresh.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(id.len(), 36);

    let chained = client
        .get(url(&gateway, "/svc/a"))
        .header("x-request-id", "edge-1")
        .send()
        .await
        .unwrap();
    let id = chained.headers()["x-request-id"].to_str().unwrap();
    assert!(id.starts_with("edge-1,"));

    // global middleware only wraps registered routes
    let missing = client.get(url(&gateway, "/none")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(missing.headers().get("x-request-id").is_none());

    gateway.shutdown();
    gateway.wait().await;
}

#[tokio::test]
async fn test_request_id_disabled() {
    let backend = start_echo_backend().await;
    let mut config = test_config();
    config.add_request_id = false;
    let (gateway, _defs) = start_gateway(
        config,
        json!([service("svc", "/svc/*", &[format!("http://{backend}")], false, json!([]))]),
    )
    .await;

    let res = reqwest::get(url(&gateway, "/svc/a")).await.unwrap();
    assert!(res.headers().get("x-request-id").is_none());

    gateway.shutdown();
    gateway.wait().await;
}

#[tokio::test]
async fn test_enforce_json_plugin() {
    let backend = start_echo_backend().await;
    let plugins = json!([{"Name": "enforce_json", "Enable": true}]);
    let (gateway, _defs) = start_gateway(
        test_config(),
        json!([service("svc", "/svc/*", &[format!("http://{backend}")], false, plugins)]),
    )
    .await;
    let client = reqwest::Client::new();

    let post = |content_type: Option<&'static str>| {
        let mut req = client.post(url(&gateway, "/svc/items")).body("{}");
        if let Some(ct) = content_type {
            req = req.header("content-type", ct);
        }
        req.send()
    };

    assert_eq!(post(None).await.unwrap().status(), StatusCode::OK);
    assert_eq!(post(Some("application/json")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(post(Some("text/")).await.unwrap().status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        post(Some("text/plain")).await.unwrap().status(),
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    );

    gateway.shutdown();
    gateway.wait().await;
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // bound then released, nothing listens there
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let (gateway, _defs) = start_gateway(
        test_config(),
        json!([service("dead", "/dead/*", &[format!("http://{dead}")], false, json!([]))]),
    )
    .await;

    let res = reqwest::get(url(&gateway, "/dead/x")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    gateway.shutdown();
    gateway.wait().await;
}

#[tokio::test]
async fn test_subtree_root_redirect() {
    let backend = start_echo_backend().await;
    let (gateway, _defs) = start_gateway(
        test_config(),
        json!([service("svc", "/svc/*", &[format!("http://{backend}")], false, json!([]))]),
    )
    .await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let res = client.get(url(&gateway, "/svc?q=1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.headers()["location"], "/svc/?q=1");

    gateway.shutdown();
    gateway.wait().await;
}
