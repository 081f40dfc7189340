// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use pulse_tracker::{
	DomSignal, HttpTransport, StaticEnvironment, Tracker, TrackerConfig, TrackerError, Transport,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> HttpTransport {
	HttpTransport::builder()
		.base_url(server.uri())
		.endpoint("/analytics/events")
		.request_timeout(Duration::from_secs(2))
		.build()
		.unwrap()
}

fn tracker(server: &MockServer) -> Tracker {
	Tracker::builder()
		.config(TrackerConfig {
			track_page_views: false,
			..TrackerConfig::default()
		})
		.environment(Arc::new(StaticEnvironment::new("https://shop.example/cart")))
		.transport(Arc::new(transport(server)))
		.build()
		.unwrap()
}

async fn received_batches(server: &MockServer) -> Vec<Vec<Value>> {
	server
		.received_requests()
		.await
		.unwrap_or_default()
		.iter()
		.map(|r| serde_json::from_slice::<Vec<Value>>(&r.body).unwrap())
		.collect()
}

#[tokio::test]
async fn test_posts_a_json_array_of_records() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/analytics/events"))
		.and(header("content-type", "application/json"))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	let tracker = tracker(&server);
	tracker.track("add_to_cart", json!({"productId": "sku-42"}));
	tracker.track("checkout", json!({"total": 99.5}));
	tracker.flush().await.unwrap();

	let batches = received_batches(&server).await;
	assert_eq!(batches.len(), 1);
	let batch = &batches[0];
	assert_eq!(batch.len(), 2);
	assert_eq!(batch[0]["eventType"], "custom_add_to_cart");
	assert_eq!(batch[0]["productId"], "sku-42");
	assert_eq!(batch[0]["pathname"], "/cart");
	assert!(batch[0]["timestamp"].is_i64());
	assert!(batch[0]["viewport"].is_object());
	assert!(batch[1].get("viewport").is_none());
	assert_eq!(batch[0]["sessionId"], batch[1]["sessionId"]);
	assert_ne!(batch[0]["eventId"], batch[1]["eventId"]);
	assert_eq!(tracker.pending_len(), 0);
}

#[tokio::test]
async fn test_server_error_keeps_records_for_the_next_flush() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
		.up_to_n_times(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(200))
		.mount(&server)
		.await;

	let tracker = tracker(&server);
	tracker.track("search", json!({"q": "shoes"}));

	let err = tracker.flush().await.unwrap_err();
	match err {
		TrackerError::ServerError { status, message } => {
			assert_eq!(status, 503);
			assert_eq!(message, "overloaded");
		}
		other => panic!("unexpected error {other:?}"),
	}
	assert_eq!(tracker.pending_len(), 1);

	tracker.flush().await.unwrap();
	assert_eq!(tracker.pending_len(), 0);

	let batches = received_batches(&server).await;
	assert_eq!(batches.len(), 2);
	assert_eq!(batches[0][0]["eventId"], batches[1][0]["eventId"]);
}

#[tokio::test]
async fn test_collector_cookies_are_sent_back_on_later_posts() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/analytics/events"))
		.and(header("cookie", "sid=abc"))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/analytics/events"))
		.respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=abc; Path=/"))
		.expect(1)
		.mount(&server)
		.await;

	let transport = transport(&server);
	transport.send(&[]).await.unwrap();
	transport.send(&[]).await.unwrap();

	let requests = server.received_requests().await.unwrap_or_default();
	assert_eq!(requests.len(), 2);
	assert!(requests[0].headers.get("cookie").is_none());
	assert_eq!(
		requests[1].headers.get("cookie").and_then(|v| v.to_str().ok()),
		Some("sid=abc")
	);
}

#[tokio::test]
async fn test_client_errors_are_retained_too() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(400))
		.mount(&server)
		.await;

	let tracker = tracker(&server);
	tracker.track("x", json!({}));
	assert!(tracker.flush().await.is_err());
	assert_eq!(tracker.pending_len(), 1);
}

#[tokio::test]
async fn test_unreachable_collector_is_a_transport_failure() {
	let transport = HttpTransport::builder()
		.endpoint("http://127.0.0.1:9/analytics/events")
		.request_timeout(Duration::from_millis(500))
		.build()
		.unwrap();
	let err = transport.send(&[]).await.unwrap_err();
	assert!(err.is_transport_failure());
}

#[tokio::test]
async fn test_unload_beacon_is_delivered_in_the_background() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/analytics/events"))
		.respond_with(ResponseTemplate::new(200))
		.expect(1)
		.mount(&server)
		.await;

	let tracker = tracker(&server);
	tracker.track("checkout", json!({}));
	tracker.handle_signal(DomSignal::Unload);
	assert_eq!(tracker.pending_len(), 0);

	let mut batches = Vec::new();
	for _ in 0..50 {
		batches = received_batches(&server).await;
		if !batches.is_empty() {
			break;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	assert_eq!(batches.len(), 1);
	let types: Vec<&str> = batches[0]
		.iter()
		.filter_map(|r| r["eventType"].as_str())
		.collect();
	assert_eq!(types, vec!["custom_checkout", "scroll_depth", "page_unload"]);
}

#[tokio::test]
async fn test_threshold_flush_sends_in_the_background() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(200))
		.mount(&server)
		.await;

	let tracker = tracker(&server);
	for i in 0..20 {
		tracker.track("item", json!({"i": i}));
	}

	for _ in 0..100 {
		if tracker.pending_len() == 0 {
			break;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	assert_eq!(tracker.pending_len(), 0);
	let batches = received_batches(&server).await;
	assert_eq!(batches.len(), 1);
	assert_eq!(batches[0].len(), 20);
}
