//! HTTP surface exercised with `oneshot` requests against the router.

mod fixtures;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use fleet_router::haversine::HaversineMatrix;
use fleet_router::http::{AppState, router};
use fleet_router::memory::InMemoryFleet;
use fleet_router::model::Motion;
use fleet_router::service::RouteService;
use fleet_router::traits::{PositionFeed, PositionSource};

use fixtures::collection_sites::{DEPOTS, STRIP_SITES};
use fixtures::scripted::ScriptedStops;

struct Harness {
    fleet: Arc<InMemoryFleet>,
    stops: Arc<ScriptedStops>,
    app: Router,
}

fn harness() -> Harness {
    let fleet = Arc::new(InMemoryFleet::new());
    fleet.update_position("d1", DEPOTS[0].coordinate());
    for site in &STRIP_SITES[..4] {
        fleet.assign_stop("d1", site.stop());
    }
    fleet.assign_stop("d2", STRIP_SITES[5].stop());

    let stops = Arc::new(ScriptedStops::new(fleet.clone()));
    let service = RouteService::new(stops.clone(), fleet.clone(), Arc::new(HaversineMatrix));
    let app = router(AppState {
        routes: Arc::new(service),
        sink: fleet.clone(),
    });
    Harness { fleet, stops, app }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn route_is_computed_on_demand() {
    let h = harness();

    let (status, body) = send(&h.app, get("/drivers/d1/route")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entityId"], "d1");
    assert_eq!(body["stopIds"].as_array().unwrap().len(), 4);
    assert_eq!(body["orderedStops"].as_array().unwrap().len(), 5);
    assert_eq!(body["orderedStops"][0]["lat"], json!(DEPOTS[0].lat));
    assert!(body["totalDistanceKm"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn route_without_position_is_not_found() {
    let h = harness();

    let (status, body) = send(&h.app, get("/drivers/d2/route")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("d2"));
    // The position is resolved before any stop fetch.
    assert_eq!(h.stops.calls("d2"), 0);
}

#[tokio::test]
async fn failing_stop_source_is_bad_gateway() {
    let h = harness();
    h.stops.fail("d1", true);

    let (status, body) = send(&h.app, get("/drivers/d1/route")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn location_report_updates_position() {
    let h = harness();
    let target = STRIP_SITES[5].coordinate();

    let (status, body) = send(
        &h.app,
        post_json(
            "/drivers/d2/location",
            &json!({ "lat": target.lat(), "lng": target.lng() }).to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert_eq!(
        h.fleet.fetch_current_position("d2").await.unwrap(),
        Some(target)
    );

    let (status, body) = send(&h.app, get("/drivers/d2/route")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stopIds"], json!([STRIP_SITES[5].name]));
}

#[tokio::test]
async fn location_report_carries_heading_and_speed() {
    let h = harness();
    let target = STRIP_SITES[2].coordinate();

    let (status, _) = send(
        &h.app,
        post_json(
            "/drivers/d1/location",
            &json!({ "lat": target.lat(), "lng": target.lng(), "heading": 90.0, "speed": 12.5 })
                .to_string(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let online = h
        .fleet
        .bulk_fetch_online_positions(&["d1".to_string()])
        .await
        .unwrap();
    assert_eq!(online["d1"].coordinate, target);
    assert_eq!(
        online["d1"].motion,
        Motion {
            heading: Some(90.0),
            speed: Some(12.5),
        }
    );
}

#[tokio::test]
async fn out_of_range_location_is_rejected() {
    let h = harness();

    let (status, _) = send(
        &h.app,
        post_json("/drivers/d1/location", r#"{"lat": 91.0, "lng": 0.0}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        h.fleet.fetch_current_position("d1").await.unwrap(),
        Some(DEPOTS[0].coordinate())
    );
}

#[tokio::test]
async fn non_numeric_location_is_rejected() {
    let h = harness();

    let (status, body) = send(
        &h.app,
        post_json("/drivers/d1/location", r#"{"lat": "north", "lng": 0.0}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn offline_report_has_no_content() {
    let h = harness();
    let mut feed = h
        .fleet
        .subscribe_position_feed(&["d1".to_string()])
        .await
        .unwrap();

    let request = Request::delete("/drivers/d1/location")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let event = feed.next().await.unwrap();
    assert_eq!(event.entity_id.as_deref(), Some("d1"));
    assert_eq!(event.online, Some(false));
}
