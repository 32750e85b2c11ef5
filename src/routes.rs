use axum::{
    Router,
    http::{HeaderValue, StatusCode, header},
    middleware,
    routing::get,
};
use request_observer::{
    ObservedRequest, RequestLogging, Responder, logging_middleware, observed_blocking,
};

pub fn router(logging: RequestLogging) -> Router {
    let blocking = Router::new()
        .route("/foo", observed_blocking(logging.clone(), foo))
        .route("/bar/create", observed_blocking(logging.clone(), bar_create))
        .fallback_service(observed_blocking::<_, ()>(logging.clone(), not_found));

    let async_routes = Router::new()
        .route("/version", get(get_version))
        .route_layer(middleware::from_fn_with_state(logging, logging_middleware));

    blocking.merge(async_routes)
}

fn foo(responder: &mut dyn Responder, request: &ObservedRequest) -> anyhow::Result<()> {
    responder.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    responder.write_body(format!("Hello from {}\n", request.uri).as_bytes())?;
    Ok(())
}

fn bar_create(responder: &mut dyn Responder, _: &ObservedRequest) -> anyhow::Result<()> {
    responder
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    responder.finalize_headers(StatusCode::UNAUTHORIZED)?;
    Ok(())
}

fn not_found(responder: &mut dyn Responder, request: &ObservedRequest) -> anyhow::Result<()> {
    responder.finalize_headers(StatusCode::NOT_FOUND)?;
    responder.write_body(format!("'{}' not found on the server!\n", request.uri).as_bytes())?;
    Ok(())
}

async fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
