// SPDX-License-Identifier: MIT OR Apache-2.0
use std::any::Any;
use std::sync::Arc;

use aer_axum::{ApiExceptionHandler, correlation_id_from};
use aer_mapping::{ErrorCode, ExceptionMapper, MapperOptions, MappingProfile};
use aer_response::ApiError;
use aer_taxonomy::{ApiException, CaughtError, OperationCanceled};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

#[derive(Debug, thiserror::Error)]
#[error("no coffee for you")]
struct TeapotException;

impl ApiException for TeapotException {
    fn context(&self) -> serde_json::Value {
        serde_json::json!({ "beverage": "coffee" })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum TeaCode {
    IAmATeapot,
}

impl ErrorCode for TeaCode {
    fn code(&self) -> i32 {
        418
    }
}

fn test_mapper() -> ExceptionMapper {
    let mut profile = MappingProfile::new();
    profile
        .add_mapping::<TeapotException, _>(StatusCode::IM_A_TEAPOT, TeaCode::IAmATeapot)
        .unwrap();
    ExceptionMapper::from_profiles(
        vec![profile],
        MapperOptions {
            service_name: "brew-svc".into(),
            respond_with_developer_context: true,
        },
    )
    .unwrap()
}

async fn teapot_route(
    State(handler): State<Arc<ApiExceptionHandler>>,
    headers: HeaderMap,
) -> Response {
    let correlation_id = correlation_id_from(&headers);
    handler.handle(CaughtError::api(TeapotException), Some(correlation_id))
}

async fn canceled_route(State(handler): State<Arc<ApiExceptionHandler>>) -> Response {
    handler.handle(CaughtError::from(OperationCanceled), None)
}

fn app(handler: ApiExceptionHandler) -> Router {
    Router::new()
        .route("/teapot", get(teapot_route))
        .route("/canceled", get(canceled_route))
        .with_state(Arc::new(handler))
}

async fn body_json(resp: Response) -> serde_json::Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn mapped_exception_produces_a_json_error_response() {
    let app = app(ApiExceptionHandler::new(Arc::new(test_mapper())));

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/teapot")
                .header("x-request-id", "corr-7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );

    let json = body_json(resp).await;
    assert_eq!(json["service"], "brew-svc");
    assert_eq!(json["correlationId"], "corr-7");
    assert_eq!(json["errorCode"], 418);
    assert_eq!(json["error"], "TeaCode.IAmATeapot");
    assert_eq!(json["context"], serde_json::json!({ "beverage": "coffee" }));
    // Production mode: humanized phrase plus the raw message.
    assert_eq!(json["message"], "I'm a teapot");
    assert_eq!(json["detailedMessage"], "no coffee for you");
}

#[tokio::test]
async fn development_mode_exposes_the_raw_message() {
    let app = app(ApiExceptionHandler::new(Arc::new(test_mapper())).development(true));

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/teapot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = body_json(resp).await;
    assert_eq!(json["message"], "no coffee for you");
    assert_eq!(json["detailedMessage"], "no coffee for you");
}

#[tokio::test]
async fn cancellation_maps_to_500_operation_canceled() {
    let app = app(ApiExceptionHandler::new(Arc::new(test_mapper())));

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/canceled")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(resp).await;
    assert_eq!(json["errorCode"], -1);
    assert_eq!(json["error"], "OperationCanceled");
}

#[tokio::test]
async fn custom_transform_reshapes_the_body() {
    let handler = ApiExceptionHandler::new(Arc::new(test_mapper())).with_transform(
        |api_error: &ApiError, status| {
            // RFC 7807 style problem object.
            serde_json::json!({
                "type": "about:blank",
                "title": api_error.message,
                "status": status.as_u16(),
                "code": api_error.error_code,
            })
        },
    );
    let app = app(handler);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/teapot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    let json = body_json(resp).await;
    assert_eq!(json["status"], 418);
    assert_eq!(json["code"], 418);
    assert!(json.get("service").is_none());
}

#[tokio::test]
async fn listener_failure_does_not_break_the_response() {
    let handler = ApiExceptionHandler::new(Arc::new(test_mapper()))
        .with_listener(|_| Err("tracker down".into()))
        .with_listener(|caught| {
            assert!(!caught.is_canceled());
            Ok(())
        });
    let app = app(handler);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/teapot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
}
