// SPDX-License-Identifier: MIT OR Apache-2.0
//! `Fault` resolves through the process-wide installed mapper, so these
//! tests get their own integration binary.

use std::any::Any;

use aer_axum::Fault;
use aer_mapping::{ErrorCode, ExceptionMapper, MapperOptions, MappingProfile, install};
use aer_taxonomy::ApiException;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use http_body_util::BodyExt;
use tower::ServiceExt;

#[derive(Debug, thiserror::Error)]
#[error("quota exhausted")]
struct QuotaExhausted;

impl ApiException for QuotaExhausted {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum QuotaCode {
    Exhausted,
}

impl ErrorCode for QuotaCode {
    fn code(&self) -> i32 {
        31
    }
}

async fn quota_route() -> Result<&'static str, Fault> {
    Err(QuotaExhausted)?
}

async fn io_route() -> Result<&'static str, Fault> {
    Err(Fault::unexpected(std::io::Error::other("surprise")))
}

#[tokio::test]
async fn fault_resolves_through_the_installed_mapper() {
    let mut profile = MappingProfile::new();
    profile
        .add_mapping::<QuotaExhausted, _>(StatusCode::TOO_MANY_REQUESTS, QuotaCode::Exhausted)
        .unwrap();
    install(
        ExceptionMapper::from_profiles(
            vec![profile],
            MapperOptions {
                service_name: "quota-svc".into(),
                respond_with_developer_context: true,
            },
        )
        .unwrap(),
    );

    let app = Router::new()
        .route("/quota", get(quota_route))
        .route("/io", get(io_route));

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/quota")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["service"], "quota-svc");
    assert_eq!(json["errorCode"], 31);
    assert_eq!(json["error"], "QuotaCode.Exhausted");

    let resp = app
        .oneshot(Request::builder().uri("/io").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "InternalServerError");
    assert_eq!(json["errorCode"], -1);
}
