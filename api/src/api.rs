use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{MatchedPath, Query, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use passforge_core::{
    history::{feed::HistoryFeed, recorder::record_detached, HistoryStore},
    process::shutdown_signal,
    pwd::PasswordGenerator,
    CharacterClasses, HistoryRecord, DEFAULT_HISTORY_LIMIT, DEFAULT_LENGTH,
};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span, instrument};
use validator::Validate;

// Consts

pub const PATH_GENERATE: &str = "/api/generate";
pub const PATH_HEALTH: &str = "/_health";
pub const PATH_HISTORY: &str = "/api/history";

// Context

pub struct ApiContext<GENERATOR: PasswordGenerator, STORE: HistoryStore> {
    pub feed: HistoryFeed<STORE>,
    pub generator: GENERATOR,
}

// Functions

pub async fn start_api<GENERATOR: PasswordGenerator + 'static, STORE: HistoryStore + 'static>(
    addr: SocketAddr,
    ctx: ApiContext<GENERATOR, STORE>,
) -> anyhow::Result<()> {
    debug!("binding tcp listener");
    let tcp = TcpListener::bind(addr).await?;
    info!(%addr, "server started");
    axum::serve(tcp, create_router(ctx))
        .with_graceful_shutdown(async {
            if let Err(err) = shutdown_signal().await {
                error!("failed to listen for signals: {err}");
            }
        })
        .await?;
    info!("server stopped");
    Ok(())
}

// Types

type Result<T = ()> = std::result::Result<T, Error>;

// Error

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("validation of request failed")]
    Validation(
        #[from]
        #[source]
        validator::ValidationErrors,
    ),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "POST")],
                Json(MessageResponse {
                    message: "Method Not Allowed".into(),
                }),
            )
                .into_response(),
            Self::Validation(err) => (StatusCode::BAD_REQUEST, Json(err)).into_response(),
        }
    }
}

// Requests

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(default)]
    include_lowercase: bool,
    #[serde(default)]
    include_numbers: bool,
    #[serde(default)]
    include_symbols: bool,
    #[serde(default)]
    include_uppercase: bool,
    #[serde(default = "default_length", deserialize_with = "deserialize_length")]
    #[validate(required, range(min = 0, max = 4096))]
    length: Option<i64>,
}

impl GenerateRequest {
    fn classes(&self) -> CharacterClasses {
        CharacterClasses {
            lowercase: self.include_lowercase,
            numbers: self.include_numbers,
            symbols: self.include_symbols,
            uppercase: self.include_uppercase,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    #[validate(range(min = 1, max = 100))]
    limit: usize,
}

// Responses

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct GenerateResponse {
    password: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct MessageResponse {
    message: String,
}

// Defaults

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_length() -> Option<i64> {
    Some(DEFAULT_LENGTH as i64)
}

// Deserializers

/// Maps any JSON value that isn't an integer to `None` so validation rejects it.
fn deserialize_length<'de, DE: Deserializer<'de>>(
    deserializer: DE,
) -> std::result::Result<Option<i64>, DE::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Length {
        Integer(i64),
        Invalid(IgnoredAny),
    }

    match Length::deserialize(deserializer)? {
        Length::Integer(length) => Ok(Some(length)),
        Length::Invalid(_) => Ok(None),
    }
}

// Router

fn create_router<GENERATOR: PasswordGenerator + 'static, STORE: HistoryStore + 'static>(
    ctx: ApiContext<GENERATOR, STORE>,
) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str)
            .unwrap_or_default();
        let span = info_span!(
            "http_request",
            http.method = %req.method(),
            http.path = path,
        );
        debug!(parent: &span, "http request received");
        span
    });
    Router::new()
        .route(PATH_HEALTH, get(health))
        .route(
            PATH_GENERATE,
            post(generate::<GENERATOR, STORE>).fallback(method_not_allowed),
        )
        .route(PATH_HISTORY, get(history::<GENERATOR, STORE>))
        .with_state(Arc::new(ctx))
        .layer(trace_layer)
}

// Handlers

#[instrument(skip(ctx, req), fields(password.length = req.length))]
async fn generate<GENERATOR: PasswordGenerator, STORE: HistoryStore + 'static>(
    State(ctx): State<Arc<ApiContext<GENERATOR, STORE>>>,
    Json(req): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>)> {
    req.validate()?;
    // validated as present and non-negative
    let length = req.length.unwrap_or_default() as usize;
    let password = ctx.generator.generate(length, req.classes());
    record_detached(&ctx.feed, password.clone());
    info!("password generated");
    Ok((StatusCode::OK, Json(GenerateResponse { password })))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[instrument(skip(ctx, query), fields(history.limit = query.limit))]
async fn history<GENERATOR: PasswordGenerator, STORE: HistoryStore>(
    State(ctx): State<Arc<ApiContext<GENERATOR, STORE>>>,
    Query(query): Query<HistoryQuery>,
) -> Result<(StatusCode, Json<Vec<HistoryRecord>>)> {
    query.validate()?;
    debug!("fetching history");
    let records = ctx.feed.recent(query.limit).await;
    Ok((StatusCode::OK, Json(records)))
}

async fn method_not_allowed(method: Method) -> Error {
    debug!(http.method = %method, "method not allowed");
    Error::MethodNotAllowed
}

// Tests

#[cfg(test)]
mod test {
    use axum::body::{to_bytes, Body};
    use mockall::predicate::*;
    use passforge_core::{
        history::{memory::InMemoryHistoryStore, Error as HistoryError, MockHistoryStore},
        pwd::{DefaultPasswordGenerator, MockPasswordGenerator},
        RecordKind,
    };
    use std::time::Duration;

    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use tokio::{sync::mpsc, time::timeout};
    use tower::ServiceExt;

    use crate::test::*;

    use super::*;

    // Functions

    async fn send<GENERATOR: PasswordGenerator + 'static, STORE: HistoryStore + 'static>(
        ctx: ApiContext<GENERATOR, STORE>,
        req: Request<Body>,
    ) -> Response {
        init_tracer();
        create_router(ctx).oneshot(req).await.unwrap()
    }

    async fn body_json<VALUE: DeserializeOwned>(resp: Response) -> VALUE {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // Mods

    mod generate {
        use super::*;

        // Data

        #[derive(Clone)]
        struct Data {
            body: Value,
            classes: CharacterClasses,
            length: usize,
            password: &'static str,
        }

        impl Default for Data {
            fn default() -> Self {
                Self {
                    body: json!({
                        "length": 20,
                        "includeUppercase": true,
                        "includeLowercase": true,
                        "includeNumbers": true,
                        "includeSymbols": false,
                    }),
                    classes: CharacterClasses {
                        lowercase: true,
                        numbers: true,
                        symbols: false,
                        uppercase: true,
                    },
                    length: 20,
                    password: "Abcdefghij0123456789",
                }
            }
        }

        // Tests

        async fn test(data: Data) -> (StatusCode, Value) {
            let mut generator = MockPasswordGenerator::new();
            generator
                .expect_generate()
                .with(eq(data.length), eq(data.classes))
                .times(1)
                .returning(move |_, _| data.password.into());
            let ctx = ApiContext {
                feed: HistoryFeed::new(InMemoryHistoryStore::default()),
                generator,
            };
            let resp = send(ctx, post_json(PATH_GENERATE, data.body)).await;
            let status = resp.status();
            (status, body_json(resp).await)
        }

        #[tokio::test]
        async fn ok() {
            let data = Data::default();
            let (status, body) = test(data.clone()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "password": data.password }));
        }

        #[tokio::test]
        async fn missing_fields() {
            let data = Data {
                body: json!({}),
                classes: CharacterClasses::default(),
                length: DEFAULT_LENGTH,
                password: "abcdefghijklmnop",
            };
            let (status, body) = test(data.clone()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "password": data.password }));
        }

        #[tokio::test]
        async fn zero_length() {
            let data = Data {
                body: json!({ "length": 0, "includeUppercase": true }),
                classes: CharacterClasses {
                    uppercase: true,
                    ..Default::default()
                },
                length: 0,
                password: "",
            };
            let (status, body) = test(data).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "password": "" }));
        }

        #[tokio::test]
        async fn real_generator_numbers_only() {
            let ctx = ApiContext {
                feed: HistoryFeed::new(InMemoryHistoryStore::default()),
                generator: DefaultPasswordGenerator,
            };
            let body = json!({ "length": 12, "includeNumbers": true });
            let resp = send(ctx, post_json(PATH_GENERATE, body)).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let body: GenerateResponse = body_json(resp).await;
            assert_eq!(body.password.len(), 12);
            assert!(body.password.chars().all(|c| c.is_ascii_digit()));
        }

        #[tokio::test]
        async fn recorded_in_history() {
            let ctx = ApiContext {
                feed: HistoryFeed::new(InMemoryHistoryStore::default()),
                generator: DefaultPasswordGenerator,
            };
            let feed = ctx.feed.clone();
            let mut sub = feed.subscribe(10);
            assert!(sub.next().await.unwrap().is_empty());
            let body = json!({ "length": 8 });
            let resp = send(ctx, post_json(PATH_GENERATE, body)).await;
            let body: GenerateResponse = body_json(resp).await;
            let records = sub.next().await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].password, body.password);
            assert_eq!(records[0].kind, RecordKind::Generated);
        }

        #[tokio::test]
        async fn history_failure_still_returns_password() {
            let mut generator = MockPasswordGenerator::new();
            generator
                .expect_generate()
                .with(eq(8), eq(CharacterClasses::default()))
                .times(1)
                .returning(|_, _| "password".into());
            let (appended_tx, mut appended_rx) = mpsc::unbounded_channel();
            let mut store = MockHistoryStore::new();
            store
                .expect_append()
                .times(1)
                .returning(move |record: &HistoryRecord| {
                    appended_tx.send(record.password.clone()).ok();
                    async_err(HistoryError::Poisoned)
                });
            let ctx = ApiContext {
                feed: HistoryFeed::new(store),
                generator,
            };
            let body = json!({ "length": 8 });
            let resp = send(ctx, post_json(PATH_GENERATE, body)).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let body: GenerateResponse = body_json(resp).await;
            assert_eq!(body.password, "password");
            let appended = timeout(Duration::from_secs(5), appended_rx.recv())
                .await
                .unwrap();
            assert_eq!(appended.as_deref(), Some("password"));
            // the store is dropped once the detached task ends
            let next = timeout(Duration::from_secs(5), appended_rx.recv())
                .await
                .unwrap();
            assert!(next.is_none());
        }

        async fn test_bad_length(length: Value) {
            let mut generator = MockPasswordGenerator::new();
            generator.expect_generate().never();
            let ctx = ApiContext {
                feed: HistoryFeed::new(InMemoryHistoryStore::default()),
                generator,
            };
            let body = json!({ "length": length });
            let resp = send(ctx, post_json(PATH_GENERATE, body)).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = body_json(resp).await;
            assert!(body["length"].is_array());
        }

        #[tokio::test]
        async fn negative_length() {
            test_bad_length(json!(-1)).await;
        }

        #[tokio::test]
        async fn too_long() {
            test_bad_length(json!(4097)).await;
        }

        #[tokio::test]
        async fn fractional_length() {
            test_bad_length(json!(8.5)).await;
        }

        #[tokio::test]
        async fn null_length() {
            test_bad_length(Value::Null).await;
        }

        #[tokio::test]
        async fn overflowing_length() {
            test_bad_length(json!(1e20)).await;
        }

        #[tokio::test]
        async fn string_length() {
            test_bad_length(json!("8")).await;
        }

        #[tokio::test]
        async fn get_not_allowed() {
            let mut generator = MockPasswordGenerator::new();
            generator.expect_generate().never();
            let ctx = ApiContext {
                feed: HistoryFeed::new(InMemoryHistoryStore::default()),
                generator,
            };
            let req = Request::builder()
                .method(Method::GET)
                .uri(PATH_GENERATE)
                .body(Body::empty())
                .unwrap();
            let resp = send(ctx, req).await;
            assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(resp.headers()[header::ALLOW], "POST");
            let body: Value = body_json(resp).await;
            assert_eq!(body, json!({ "message": "Method Not Allowed" }));
        }
    }

    mod health {
        use super::*;

        #[tokio::test]
        async fn no_content() {
            let ctx = ApiContext {
                feed: HistoryFeed::new(InMemoryHistoryStore::default()),
                generator: DefaultPasswordGenerator,
            };
            let req = Request::builder()
                .uri(PATH_HEALTH)
                .body(Body::empty())
                .unwrap();
            let resp = send(ctx, req).await;
            assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        }
    }

    mod history {
        use super::*;

        // Data

        struct Data {
            count: usize,
            uri: String,
        }

        impl Default for Data {
            fn default() -> Self {
                Self {
                    count: 3,
                    uri: PATH_HISTORY.into(),
                }
            }
        }

        // Tests

        async fn test(data: Data) -> (StatusCode, Value) {
            let feed = HistoryFeed::new(InMemoryHistoryStore::default());
            for idx in 0..data.count {
                feed.append(&HistoryRecord::generated(format!("pwd{idx}")))
                    .await
                    .unwrap();
            }
            let ctx = ApiContext {
                feed,
                generator: DefaultPasswordGenerator,
            };
            let req = Request::builder()
                .uri(data.uri)
                .body(Body::empty())
                .unwrap();
            let resp = send(ctx, req).await;
            let status = resp.status();
            (status, body_json(resp).await)
        }

        fn passwords(body: &Value) -> Vec<&str> {
            body.as_array()
                .unwrap()
                .iter()
                .map(|record| record["password"].as_str().unwrap())
                .collect()
        }

        #[tokio::test]
        async fn newest_first() {
            let (status, body) = test(Data::default()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(passwords(&body), vec!["pwd2", "pwd1", "pwd0"]);
            assert_eq!(body[0]["type"], "generated");
        }

        #[tokio::test]
        async fn default_limit() {
            let data = Data {
                count: DEFAULT_HISTORY_LIMIT + 5,
                ..Default::default()
            };
            let (status, body) = test(data).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(passwords(&body).len(), DEFAULT_HISTORY_LIMIT);
        }

        #[tokio::test]
        async fn explicit_limit() {
            let data = Data {
                uri: format!("{PATH_HISTORY}?limit=2"),
                ..Default::default()
            };
            let (status, body) = test(data).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(passwords(&body), vec!["pwd2", "pwd1"]);
        }

        #[tokio::test]
        async fn zero_limit() {
            let data = Data {
                uri: format!("{PATH_HISTORY}?limit=0"),
                ..Default::default()
            };
            let (status, _) = test(data).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        #[tokio::test]
        async fn store_offline() {
            let mut store = MockHistoryStore::new();
            store
                .expect_recent()
                .with(eq(DEFAULT_HISTORY_LIMIT))
                .times(1)
                .returning(|_| async_err(HistoryError::Poisoned));
            let ctx = ApiContext {
                feed: HistoryFeed::new(store),
                generator: DefaultPasswordGenerator,
            };
            let req = Request::builder()
                .uri(PATH_HISTORY)
                .body(Body::empty())
                .unwrap();
            let resp = send(ctx, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let body: Value = body_json(resp).await;
            assert_eq!(body, json!([]));
        }
    }
}
