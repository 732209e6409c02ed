//! Integration tests for the async session against a mock array.

use std::time::Duration;

use flashblade_client::{ClientError, ErrorClass, FlashBladeClient, Request, Response};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> FlashBladeClient {
    FlashBladeClient::new(server.uri())
        .expect("valid mock url")
        .with_session_token("session-1")
}

fn item(name: &str) -> Value {
    json!({ "name": name })
}

async fn continuation_tokens(server: &MockServer) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == "continuation_token")
                .map(|(_, value)| value.into_owned())
        })
        .collect()
}

async fn mount_first_page(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param_is_missing("continuation_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("a")],
            "continuation_token": "t1",
            "more_items_remaining": true,
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn get_kmip_returns_the_full_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/kmip"))
        .and(header("x-auth-token", "session-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "req-42")
                .set_body_json(json!({
                    "items": [item("kmip-1"), item("kmip-2")],
                    "total_item_count": 2,
                    "continuation_token": null,
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let Response::Valid(valid) = client
        .invoke::<Value>(Request::new("get_kmip"))
        .await
        .expect("invoke succeeds")
    else {
        panic!("expected a valid response");
    };
    assert_eq!(valid.request_id(), Some("req-42"));
    assert_eq!(valid.total_item_count(), Some(2));

    let items = valid.into_items().try_collect().await.expect("items load");
    assert_eq!(items, vec![item("kmip-1"), item("kmip-2")]);
}

#[tokio::test]
async fn limit_is_honored_across_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/file-systems/locks/clients"))
        .and(query_param_is_missing("continuation_token"))
        .and(query_param("limit", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("c0"), item("c1")],
            "continuation_token": "t1",
            "more_items_remaining": true,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/file-systems/locks/clients"))
        .and(query_param("continuation_token", "t1"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("c2"), item("c3")],
            "continuation_token": "t2",
            "more_items_remaining": true,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/file-systems/locks/clients"))
        .and(query_param("continuation_token", "t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("c4")],
        })))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client
        .invoke::<Value>(Request::new("get_file_systems_locks_clients").limit(4))
        .await
        .expect("invoke succeeds");
    let valid = response.into_result().expect("valid response");
    let items = valid.into_items().try_collect().await.expect("items load");
    assert_eq!(items, vec![item("c0"), item("c1"), item("c2"), item("c3")]);
}

#[tokio::test]
async fn deleting_a_missing_virtual_host_is_an_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/2.12/object-store-virtual-hosts"))
        .and(query_param("names", "s3.myhost.com"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{
                "message": "Object store virtual host does not exist.",
                "context": "s3.myhost.com",
            }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client
        .invoke::<Value>(
            Request::new("delete_object_store_virtual_hosts").names(["s3.myhost.com"]),
        )
        .await
        .expect("remote failures are not client errors");
    match response {
        Response::Error(error) => {
            assert_eq!(error.class(), ErrorClass::NotFound);
            assert_eq!(error.status().as_u16(), 400);
            assert_eq!(error.errors().len(), 1);
        }
        Response::Valid(_) => panic!("expected an error envelope"),
    }
}

#[tokio::test]
async fn deleting_an_existing_virtual_host_yields_no_items() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/2.12/object-store-virtual-hosts"))
        .and(query_param("names", "s3.myhost.com"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client
        .invoke::<Value>(
            Request::new("delete_object_store_virtual_hosts").names(["s3.myhost.com"]),
        )
        .await
        .expect("invoke succeeds");
    assert!(response.is_valid());
    let items = response
        .into_result()
        .expect("valid response")
        .into_items()
        .try_collect()
        .await
        .expect("no further pages");
    assert!(items.is_empty());
}

#[tokio::test]
async fn rejected_credentials_are_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/remote-arrays"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{ "message": "Invalid session." }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client
        .invoke::<Value>(Request::new("get_remote_arrays").flag("local_only", true))
        .await
        .expect_err("401 is fatal");
    assert!(matches!(error, ClientError::Authentication(message) if message == "Invalid session."));
}

#[tokio::test]
async fn conflicting_selectors_send_nothing() {
    let server = MockServer::start().await;

    let client = client_for(&server);
    let error = client
        .invoke::<Value>(
            Request::new("delete_active_directory")
                .names(["ad1", "ad2"])
                .ids(["id-1"]),
        )
        .await
        .expect_err("conflict is local");
    assert!(matches!(error, ClientError::ConflictingSelectors { .. }));

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn timed_out_page_pull_surfaces_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/file-systems"))
        .and(query_param_is_missing("continuation_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("fs1")],
            "continuation_token": "t1",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/file-systems"))
        .and(query_param("continuation_token", "t1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({ "items": [item("fs2")] })),
        )
        .mount(&server)
        .await;

    let client = FlashBladeClient::new(server.uri())
        .expect("valid mock url")
        .with_timeout(Duration::from_millis(200))
        .expect("client builds");
    let Response::Valid(valid) = client
        .invoke::<Value>(Request::new("get_file_systems"))
        .await
        .expect("first page loads")
    else {
        panic!("expected a valid response");
    };
    let mut pager = valid.into_items();

    assert_eq!(pager.try_next().await.expect("buffered"), Some(item("fs1")));
    let error = pager.try_next().await.expect_err("second page times out");
    assert!(matches!(error, ClientError::Request(_)));
    assert_eq!(pager.try_next().await.expect("ended"), None);
}

#[tokio::test]
async fn cancelled_pull_retries_the_same_token() {
    let server = MockServer::start().await;
    mount_first_page(&server, "/api/2.12/file-systems").await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/file-systems"))
        .and(query_param("continuation_token", "t1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({ "items": [item("b")] })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let Response::Valid(valid) = client
        .invoke::<Value>(Request::new("get_file_systems"))
        .await
        .expect("first page loads")
    else {
        panic!("expected a valid response");
    };
    let mut pager = valid.into_items();
    assert_eq!(pager.buffered(), 1);
    assert_eq!(pager.try_next().await.expect("buffered"), Some(item("a")));

    let pull = tokio::time::timeout(Duration::from_millis(50), pager.try_next()).await;
    assert!(pull.is_err(), "pull should have been cancelled");

    assert_eq!(pager.try_next().await.expect("retry succeeds"), Some(item("b")));
    assert_eq!(pager.try_next().await.expect("ended"), None);
    assert_eq!(
        continuation_tokens(&server).await,
        vec![None, Some("t1".to_owned()), Some("t1".to_owned())]
    );
}

#[tokio::test]
async fn resumed_async_pull_reuses_last_good_token() {
    let server = MockServer::start().await;
    mount_first_page(&server, "/api/2.12/file-systems/locks/clients").await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/file-systems/locks/clients"))
        .and(query_param("continuation_token", "t1"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "errors": [{ "message": "Service temporarily unavailable." }]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/file-systems/locks/clients"))
        .and(query_param("continuation_token", "t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("b"), item("c")],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let Response::Valid(valid) = client
        .invoke::<Value>(Request::new("get_file_systems_locks_clients"))
        .await
        .expect("first page loads")
    else {
        panic!("expected a valid response");
    };
    let mut pager = valid.into_items();
    assert_eq!(pager.try_next().await.expect("buffered"), Some(item("a")));

    match pager.try_next().await {
        Err(ClientError::PageRejected(error)) => assert_eq!(error.class(), ErrorClass::Server),
        other => panic!("unexpected pull result: {other:?}"),
    }
    assert_eq!(pager.try_next().await.expect("ended"), None);
    assert!(pager.resume());

    let rest = pager.try_collect().await.expect("retry succeeds");
    assert_eq!(rest, vec![item("b"), item("c")]);
    assert_eq!(
        continuation_tokens(&server).await,
        vec![None, Some("t1".to_owned()), Some("t1".to_owned())]
    );
}

#[tokio::test]
async fn login_and_logout_manage_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(header("api-token", "api-secret"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-auth-token", "session-9"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.12/arrays"))
        .and(header("x-auth-token", "session-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("array-1")],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/logout"))
        .and(header("x-auth-token", "session-9"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = FlashBladeClient::new(server.uri())
        .expect("valid mock url")
        .login("api-secret")
        .await
        .expect("login succeeds");

    let items = client
        .invoke::<Value>(Request::new("get_arrays"))
        .await
        .expect("invoke succeeds")
        .into_result()
        .expect("valid response")
        .into_items()
        .try_collect()
        .await
        .expect("items load");
    assert_eq!(items, vec![item("array-1")]);

    client.logout().await.expect("logout succeeds");
}

#[tokio::test]
async fn failed_login_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let error = FlashBladeClient::new(server.uri())
        .expect("valid mock url")
        .login("wrong")
        .await
        .expect_err("login rejected");
    assert!(matches!(error, ClientError::Authentication(_)));
}
