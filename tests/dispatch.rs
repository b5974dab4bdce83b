//! Pipeline tests driving the dispatcher directly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use serde_json::{json, Value};
use switchyard::cache::CacheFactory;
use switchyard::config::{CacheConfig, RoutingConfig};
use switchyard::http::Content;
use switchyard::routing::RouteDefinition;
use switchyard::{
    AuthError, Dispatcher, Flow, HttpError, Principal, Reply, RequestContext, Response, RouteOptions,
};

mod common;
use common::{assert_error_body, json_body, request, request_with_body, tagged};

fn bearer_dispatcher() -> Dispatcher {
    let dispatcher = Dispatcher::default();
    dispatcher.set_authenticator(|req: &RequestContext| {
        let header = req.header("authorization").map(str::to_owned);
        async move {
            match header.as_deref().and_then(|h| h.strip_prefix("Bearer ")) {
                Some(user) => Ok(Principal::new(user)),
                None => Err(AuthError::new("Missing bearer token")),
            }
        }
    });
    dispatcher
}

#[tokio::test]
async fn test_most_specific_route_wins_in_any_order() {
    let orders = [
        ["/users/:id", "/users/profile", "/users"],
        ["/users", "/users/:id", "/users/profile"],
        ["/users/profile", "/users", "/users/:id"],
    ];
    for order in orders {
        let dispatcher = Dispatcher::default();
        for path in order {
            dispatcher.get(path, tagged(path)).unwrap();
        }

        let response = dispatcher.dispatch(request(Method::GET, "/users/profile")).await;
        assert_eq!(json_body(&response), json!("/users/profile"));

        let response = dispatcher.dispatch(request(Method::GET, "/users")).await;
        assert_eq!(json_body(&response), json!("/users"));

        let response = dispatcher.dispatch(request(Method::GET, "/users/42")).await;
        assert_eq!(json_body(&response), json!("/users/:id"));
    }
}

#[tokio::test]
async fn test_literal_beats_wildcard() {
    let dispatcher = Dispatcher::default();
    dispatcher.get("/files/*", tagged("wildcard")).unwrap();
    dispatcher.get("/files/specific", tagged("literal")).unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/files/specific")).await;
    assert_eq!(json_body(&response), json!("literal"));

    let response = dispatcher.dispatch(request(Method::GET, "/files/a/b")).await;
    assert_eq!(json_body(&response), json!("wildcard"));
}

#[tokio::test]
async fn test_params_reach_the_handler() {
    let dispatcher = Dispatcher::default();
    dispatcher
        .get("/users/:userId/posts/:postId", |req: Arc<RequestContext>| async move {
            Ok::<_, HttpError>(json!(req.params()))
        })
        .unwrap();
    dispatcher
        .get("/files/:path+", |req: Arc<RequestContext>| async move {
            Ok::<_, HttpError>(json!({ "path": req.param("path"), "route": req.route_path() }))
        })
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/users/123/posts/456")).await;
    assert_eq!(json_body(&response), json!({ "userId": "123", "postId": "456" }));

    let response = dispatcher.dispatch(request(Method::GET, "/files/a/b/c.txt")).await;
    assert_eq!(
        json_body(&response),
        json!({ "path": "a/b/c.txt", "route": "/files/:path+" })
    );
}

#[tokio::test]
async fn test_not_found_versus_forbidden() {
    let dispatcher = bearer_dispatcher();
    dispatcher
        .route("GET", "/internal", RouteOptions::new().expose(false).auth(true), tagged("hidden"))
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/nowhere")).await;
    assert_error_body(&response, 404, "Route not found");

    let response = dispatcher.dispatch(request(Method::GET, "/internal")).await;
    assert_error_body(&response, 403, "Forbidden");

    // Credentials make no difference to an unexposed route.
    let mut authed = request(Method::GET, "/internal");
    authed
        .headers_mut()
        .insert("authorization", HeaderValue::from_static("Bearer alice"));
    let response = dispatcher.dispatch(authed).await;
    assert_error_body(&response, 403, "Forbidden");
}

#[tokio::test]
async fn test_exposure_default_is_honoured() {
    let exposed = Dispatcher::default();
    exposed.get("/implicit", tagged("ok")).unwrap();
    let response = exposed.dispatch(request(Method::GET, "/implicit")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let hidden = Dispatcher::new(
        RoutingConfig {
            expose_by_default: false,
            ..RoutingConfig::default()
        },
        CacheConfig::default(),
    );
    hidden.get("/implicit", tagged("ok")).unwrap();
    let response = hidden.dispatch(request(Method::GET, "/implicit")).await;
    assert_error_body(&response, 403, "Forbidden");
}

#[tokio::test]
async fn test_before_middleware_short_circuit_skips_everything() {
    let dispatcher = bearer_dispatcher();
    let handler_ran = Arc::new(AtomicBool::new(false));
    let later_middleware_ran = Arc::new(AtomicBool::new(false));
    let auth_ran = Arc::new(AtomicBool::new(false));

    let flag = auth_ran.clone();
    dispatcher.set_authenticator(move |_req: &RequestContext| {
        flag.store(true, Ordering::SeqCst);
        async move { Ok::<_, AuthError>(Principal::new("alice")) }
    });

    dispatcher.before(|_req: RequestContext| async move {
        Ok::<_, HttpError>(Flow::Respond(Response::text(StatusCode::SERVICE_UNAVAILABLE, "maintenance")))
    });
    let flag = later_middleware_ran.clone();
    dispatcher.before(move |req: RequestContext| {
        flag.store(true, Ordering::SeqCst);
        async move { Ok::<_, HttpError>(Flow::Continue(req)) }
    });

    let flag = handler_ran.clone();
    dispatcher
        .route("GET", "/account", RouteOptions::new().auth(true), move |_req: Arc<RequestContext>| {
            flag.store(true, Ordering::SeqCst);
            async move { Ok::<_, HttpError>(json!("account")) }
        })
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/account")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body_text(), "maintenance");
    assert!(!handler_ran.load(Ordering::SeqCst));
    assert!(!later_middleware_ran.load(Ordering::SeqCst));
    assert!(!auth_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_middleware_can_hand_data_to_the_handler() {
    #[derive(Clone)]
    struct Tenant(String);

    let dispatcher = Dispatcher::default();
    dispatcher.before(|mut req: RequestContext| async move {
        let tenant = req.header("x-tenant").unwrap_or("public").to_owned();
        req.context_mut().insert(Tenant(tenant));
        Ok::<_, HttpError>(Flow::Continue(req))
    });
    dispatcher
        .get("/tenant", |req: Arc<RequestContext>| async move {
            let tenant = req.context().get::<Tenant>().map(|t| t.0.clone());
            Ok::<_, HttpError>(json!(tenant))
        })
        .unwrap();

    let mut req = request(Method::GET, "/tenant");
    req.headers_mut().insert("x-tenant", HeaderValue::from_static("acme"));
    let response = dispatcher.dispatch(req).await;
    assert_eq!(json_body(&response), json!("acme"));
}

#[tokio::test]
async fn test_auth_failure_is_401_with_message() {
    let dispatcher = bearer_dispatcher();
    dispatcher
        .route("GET", "/me", RouteOptions::new().auth(true), |req: Arc<RequestContext>| async move {
            let id = req.principal().map(|p| p.id.clone());
            Ok::<_, HttpError>(json!({ "id": id }))
        })
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/me")).await;
    assert_error_body(&response, 401, "Missing bearer token");

    let mut req = request(Method::GET, "/me");
    req.headers_mut()
        .insert("authorization", HeaderValue::from_static("Bearer alice"));
    let response = dispatcher.dispatch(req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response), json!({ "id": "alice" }));
}

#[tokio::test]
async fn test_auth_without_authenticator_fails_closed() {
    let dispatcher = Dispatcher::default();
    dispatcher
        .route("GET", "/me", RouteOptions::new().auth(true), tagged("secret"))
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/me")).await;
    assert_error_body(&response, 401, "Unauthorized");
}

#[tokio::test]
async fn test_body_decoding() {
    let dispatcher = Dispatcher::default();
    let describe = |req: Arc<RequestContext>| async move {
        let kind = match req.content() {
            Some(Content::Json(value)) => json!({ "json": value }),
            Some(Content::Form(form)) => json!({ "form": form }),
            Some(Content::Text(text)) => json!({ "text": text }),
            Some(Content::Multipart(form)) => json!({ "parts": form.len() }),
            None => json!(null),
        };
        Ok::<_, HttpError>(kind)
    };
    dispatcher.post("/describe", describe).unwrap();
    dispatcher
        .route("POST", "/raw", RouteOptions::new().raw_request(true), describe)
        .unwrap();

    let response = dispatcher
        .dispatch(request_with_body(Method::POST, "/describe", "application/json", r#"{"a":1}"#))
        .await;
    assert_eq!(json_body(&response), json!({ "json": { "a": 1 } }));

    let response = dispatcher
        .dispatch(request_with_body(
            Method::POST,
            "/describe",
            "application/x-www-form-urlencoded",
            "tag=a&tag=b&q=x",
        ))
        .await;
    assert_eq!(json_body(&response), json!({ "form": { "tag": ["a", "b"], "q": "x" } }));

    let response = dispatcher
        .dispatch(request_with_body(Method::POST, "/describe", "text/plain", "hello"))
        .await;
    assert_eq!(json_body(&response), json!({ "text": "hello" }));

    // Malformed JSON is not fatal.
    let response = dispatcher
        .dispatch(request_with_body(Method::POST, "/describe", "application/json", "{oops"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response), json!(null));

    let response = dispatcher
        .dispatch(request_with_body(Method::POST, "/raw", "application/json", r#"{"a":1}"#))
        .await;
    assert_eq!(json_body(&response), json!(null));
}

#[tokio::test]
async fn test_cached_route_calls_handler_once() {
    let dispatcher = Dispatcher::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    dispatcher
        .route("GET", "/expensive", RouteOptions::new().cache(60.0), move |_req: Arc<RequestContext>| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, HttpError>(json!({ "computed": n, "items": [1, 2, 3] })) }
        })
        .unwrap();

    for _ in 0..3 {
        let response = dispatcher.dispatch(request(Method::GET, "/expensive")).await;
        assert_eq!(json_body(&response), json!({ "computed": 1, "items": [1, 2, 3] }));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A different query string is a different cache slot.
    let response = dispatcher.dispatch(request(Method::GET, "/expensive?page=2")).await;
    assert_eq!(json_body(&response)["computed"], 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cache_is_partitioned_by_principal() {
    let dispatcher = bearer_dispatcher();
    dispatcher
        .route(
            "GET",
            "/profile",
            RouteOptions::new().auth(true).cache(60.0),
            |req: Arc<RequestContext>| async move {
                let id = req.principal().map(|p| p.id.clone());
                Ok::<_, HttpError>(json!({ "id": id }))
            },
        )
        .unwrap();

    for user in ["alice", "bob", "alice"] {
        let mut req = request(Method::GET, "/profile");
        req.headers_mut().insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {user}")).unwrap(),
        );
        let response = dispatcher.dispatch(req).await;
        assert_eq!(json_body(&response), json!({ "id": user }));
    }
    assert_eq!(dispatcher.cache().store().len(), 2);
}

#[tokio::test]
async fn test_explicit_cache_key_is_shared() {
    let dispatcher = Dispatcher::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    dispatcher
        .route(
            "GET",
            "/stats",
            RouteOptions::new().cache_with_key(60.0, "stats"),
            move |_req: Arc<RequestContext>| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, HttpError>(json!("stats")) }
            },
        )
        .unwrap();

    dispatcher.dispatch(request(Method::GET, "/stats?a=1")).await;
    dispatcher.dispatch(request(Method::GET, "/stats?b=2")).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(dispatcher.cache().store().has("stats"));
}

#[tokio::test]
async fn test_cached_response_is_rebuilt() {
    let dispatcher = Dispatcher::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    dispatcher
        .route("GET", "/report.csv", RouteOptions::new().cache(60.0), move |_req: Arc<RequestContext>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, HttpError>(
                    Response::text(StatusCode::CREATED, "a,b\n1,2\n")
                        .with_content_type("text/csv")
                        .with_header(HeaderName::from_static("x-report"), HeaderValue::from_static("v1")),
                )
            }
        })
        .unwrap();

    let first = dispatcher.dispatch(request(Method::GET, "/report.csv")).await;
    let second = dispatcher.dispatch(request(Method::GET, "/report.csv")).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for response in [first, second] {
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.header("content-type"), Some("text/csv"));
        assert_eq!(response.header("x-report"), Some("v1"));
        assert_eq!(response.body_text(), "a,b\n1,2\n");
    }
}

#[tokio::test]
async fn test_cached_binary_response_is_byte_exact() {
    const PNG: &[u8] = &[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0xff, 0x00, 0xfe];

    let dispatcher = Dispatcher::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    dispatcher
        .route("GET", "/logo.png", RouteOptions::new().cache(60.0), move |_req: Arc<RequestContext>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, HttpError>(
                    Response::new(StatusCode::OK)
                        .with_content_type("image/png")
                        .with_body(PNG),
                )
            }
        })
        .unwrap();

    let miss = dispatcher.dispatch(request(Method::GET, "/logo.png")).await;
    let hit = dispatcher.dispatch(request(Method::GET, "/logo.png")).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for response in [miss, hit] {
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header("content-type"), Some("image/png"));
        assert_eq!(response.body().as_ref(), PNG);
    }
}

#[tokio::test]
async fn test_cache_keeps_colon_principals_apart() {
    let dispatcher = bearer_dispatcher();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    dispatcher
        .route(
            "GET",
            "/p",
            RouteOptions::new().auth(true).cache(60.0),
            move |req: Arc<RequestContext>| {
                counter.fetch_add(1, Ordering::SeqCst);
                let user = req.principal().map(|p| p.id.clone());
                async move { Ok::<_, HttpError>(json!({ "user": user })) }
            },
        )
        .unwrap();

    let mut first = request(Method::GET, "/p?a");
    first
        .headers_mut()
        .insert("authorization", HeaderValue::from_static("Bearer b:c"));
    let response = dispatcher.dispatch(first).await;
    assert_eq!(json_body(&response), json!({ "user": "b:c" }));

    let mut second = request(Method::GET, "/p?a:b");
    second
        .headers_mut()
        .insert("authorization", HeaderValue::from_static("Bearer c"));
    let response = dispatcher.dispatch(second).await;
    assert_eq!(json_body(&response), json!({ "user": "c" }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_wide_integers_are_sent_as_strings() {
    #[derive(serde::Serialize)]
    struct Supply {
        total: u128,
        burned: i128,
        holders: u64,
    }

    let dispatcher = Dispatcher::default();
    dispatcher
        .get("/big", |_req: Arc<RequestContext>| async move {
            Reply::json(&(1u128 << 70))
        })
        .unwrap();
    dispatcher
        .route("GET", "/supply", RouteOptions::new().cache(60.0), |_req: Arc<RequestContext>| async move {
            Reply::json(&Supply {
                total: u128::MAX,
                burned: -(1i128 << 100),
                holders: 12,
            })
        })
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/big")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response), json!("1180591620717411303424"));

    for _ in 0..2 {
        let response = dispatcher.dispatch(request(Method::GET, "/supply")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(&response),
            json!({
                "total": "340282366920938463463374607431768211455",
                "burned": "-1267650600228229401496703205376",
                "holders": 12,
            })
        );
    }
}

#[tokio::test]
async fn test_custom_cache_provider_replaces_store() {
    let dispatcher = Dispatcher::default();
    let keys = Arc::new(Mutex::new(Vec::new()));
    let seen = keys.clone();
    dispatcher.set_cache_provider(move |key: String, factory: CacheFactory, _ttl: f64| {
        seen.lock().unwrap().push(key);
        async move { factory().await }
    });
    dispatcher
        .route("GET", "/items", RouteOptions::new().cache(30.0), tagged("items"))
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/items?x=1")).await;
    assert_eq!(json_body(&response), json!("items"));
    assert_eq!(*keys.lock().unwrap(), ["GET:6:/items:3:x=1:anonymous"]);
    assert!(dispatcher.cache().store().is_empty());
}

#[tokio::test]
async fn test_handler_errors_use_the_error_body() {
    let dispatcher = Dispatcher::default();
    dispatcher
        .get("/conflict", |_req: Arc<RequestContext>| async move {
            Err::<Value, _>(HttpError::new(StatusCode::CONFLICT, "Version mismatch"))
        })
        .unwrap();
    dispatcher
        .get("/teapot", |_req: Arc<RequestContext>| async move {
            Err::<Value, _>(HttpError::with_status(StatusCode::IM_A_TEAPOT))
        })
        .unwrap();
    dispatcher
        .get("/broken", |_req: Arc<RequestContext>| async move {
            Err::<Value, _>(HttpError::internal("database unreachable"))
        })
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/conflict")).await;
    assert_error_body(&response, 409, "Version mismatch");

    let response = dispatcher.dispatch(request(Method::GET, "/teapot")).await;
    assert_error_body(&response, 418, "I'm a teapot");

    let response = dispatcher.dispatch(request(Method::GET, "/broken")).await;
    assert_error_body(&response, 500, "database unreachable");
}

#[tokio::test]
async fn test_thrown_response_is_returned_verbatim() {
    let dispatcher = Dispatcher::default();
    dispatcher
        .get("/moved", |_req: Arc<RequestContext>| async move {
            let redirect = Response::new(StatusCode::FOUND)
                .with_header(HeaderName::from_static("location"), HeaderValue::from_static("/new"));
            Err::<Value, _>(HttpError::respond(redirect))
        })
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/moved")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.header("location"), Some("/new"));
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn test_panics_become_500() {
    let dispatcher = Dispatcher::default();
    dispatcher
        .get("/panic", |_req: Arc<RequestContext>| async move {
            if true {
                panic!("handler exploded");
            }
            Ok::<_, HttpError>(json!(null))
        })
        .unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/panic")).await;
    assert_error_body(&response, 500, "handler exploded");
}

#[tokio::test]
async fn test_after_middleware_all_run_in_order() {
    let dispatcher = Dispatcher::default();
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let order = order.clone();
        dispatcher.after(move |response: Response, _req: Arc<RequestContext>| {
            order.lock().unwrap().push(name);
            async move {
                Ok::<_, HttpError>(
                    response.with_header(HeaderName::from_static("x-last"), HeaderValue::from_static(name)),
                )
            }
        });
    }
    dispatcher.get("/", tagged("root")).unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/")).await;
    assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
    assert_eq!(response.header("x-last"), Some("third"));
}

#[tokio::test]
async fn test_response_normalization() {
    let dispatcher = Dispatcher::default();
    dispatcher
        .route(
            "GET",
            "/page",
            RouteOptions::new().raw_response(true).content_type("text/html"),
            |_req: Arc<RequestContext>| async move { Ok::<_, HttpError>("<h1>hi</h1>") },
        )
        .unwrap();
    dispatcher
        .route(
            "GET",
            "/plain",
            RouteOptions::new().content_type("text/plain"),
            |_req: Arc<RequestContext>| async move { Ok::<_, HttpError>("just text") },
        )
        .unwrap();
    dispatcher.get("/json", tagged("quoted")).unwrap();

    let response = dispatcher.dispatch(request(Method::GET, "/page")).await;
    assert_eq!(response.header("content-type"), Some("text/html"));
    assert_eq!(response.body_text(), "<h1>hi</h1>");

    let response = dispatcher.dispatch(request(Method::GET, "/plain")).await;
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.body_text(), "just text");

    let response = dispatcher.dispatch(request(Method::GET, "/json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.body_text(), "\"quoted\"");
}

#[tokio::test]
async fn test_options_matches_any_method() {
    let dispatcher = Dispatcher::default();
    dispatcher.post("/submit", tagged("submit")).unwrap();

    let response = dispatcher.dispatch(request(Method::OPTIONS, "/submit")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = dispatcher.dispatch(request(Method::GET, "/submit")).await;
    assert_error_body(&response, 404, "Route not found");
}

#[tokio::test]
async fn test_replacing_routes_while_serving() {
    let dispatcher = Dispatcher::default();
    dispatcher.get("/v", tagged("one")).unwrap();
    let response = dispatcher.dispatch(request(Method::GET, "/v")).await;
    assert_eq!(json_body(&response), json!("one"));

    dispatcher
        .replace_routes(&vec![RouteDefinition::new("GET", "/v", tagged("two"))])
        .unwrap();
    let response = dispatcher.dispatch(request(Method::GET, "/v")).await;
    assert_eq!(json_body(&response), json!("two"));
}
