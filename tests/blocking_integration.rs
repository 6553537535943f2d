mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use ledgerpay_http::{
    ApiRequest, BlockingLedgerClient, ClientOptions, LedgerError, RequestBody, RequestOptions,
    Validate,
};
use serde::Deserialize;
use serde_json::json;

use common::{spawn_server_thread, MockResponse, NoWait};

#[derive(Debug, Deserialize)]
struct Counterparty {
    id: String,
    name: String,
}

impl Validate for Counterparty {}

fn client(base_url: String) -> BlockingLedgerClient {
    BlockingLedgerClient::new(base_url, "org_123", "key_456")
        .with_options(ClientOptions {
            idempotency_header: Some("Idempotency-Key".to_owned()),
            ..ClientOptions::default()
        })
        .with_wait(Arc::new(NoWait))
}

#[test]
fn blocking_execute_retries_until_success() {
    let server = spawn_server_thread(vec![
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({})),
        MockResponse::json(StatusCode::TOO_MANY_REQUESTS, json!({})),
        MockResponse::json(StatusCode::OK, json!({"id": "cp_1", "name": "Acme"})),
    ]);

    let counterparty: Counterparty = client(server.api_url())
        .execute(
            ApiRequest::post()
                .path_segment("counterparties")
                .json(&json!({"name": "Acme"}))
                .expect("body must encode"),
            RequestOptions::new(),
        )
        .expect("request must succeed after retries");

    assert_eq!(counterparty.id, "cp_1");
    assert_eq!(counterparty.name, "Acme");
    assert_eq!(server.hits(), 3);

    let seen = server.seen();
    let first_key = seen[0].header("idempotency-key");
    assert!(first_key.is_some());
    assert!(seen
        .iter()
        .all(|request| request.header("idempotency-key") == first_key));
}

#[test]
fn blocking_one_shot_upload_is_never_retried() {
    let server = spawn_server_thread(vec![
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, json!({})),
        MockResponse::json(StatusCode::OK, json!({"id": "doc_1", "name": "scan.pdf"})),
    ]);

    let err = client(server.api_url())
        .execute::<Counterparty>(
            ApiRequest::post()
                .path_segment("documents")
                .body(RequestBody::one_shot(b"%PDF-1.7".to_vec(), None)),
            RequestOptions::new().max_retries(5),
        )
        .expect_err("request must fail");

    assert!(matches!(err, LedgerError::Api(ref api) if api.status == 503));
    assert_eq!(server.hits(), 1);
    assert_eq!(server.seen()[0].header("idempotency-key"), None);
}

#[test]
fn blocking_pages_iterate_across_cursor() {
    let server = spawn_server_thread(vec![
        MockResponse::json(
            StatusCode::OK,
            json!([{"id": "cp_1", "name": "A"}, {"id": "cp_2", "name": "B"}]),
        )
        .with_header("x-after-cursor", "next_cp"),
        MockResponse::json(StatusCode::OK, json!([{"id": "cp_3", "name": "C"}])),
    ]);

    let page = client(server.api_url())
        .list::<Counterparty>(
            ApiRequest::get().path_segment("counterparties"),
            RequestOptions::new(),
        )
        .expect("list must succeed");
    assert_eq!(page.items().len(), 2);
    assert_eq!(page.after_cursor(), "next_cp");

    let next = page
        .next_page()
        .expect("next page must load")
        .expect("must have next page");
    assert_eq!(next.items()[0].id, "cp_3");
    assert!(!next.has_next_page());
    assert!(next.next_page().expect("must not fail").is_none());

    assert_eq!(server.hits(), 2);
    assert_eq!(server.seen()[1].query.as_deref(), Some("after_cursor=next_cp"));
}
