use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    routing::{MethodRouter, any},
};

use crate::{
    error::{ApplicationError, ApplicationResult},
    observer::{ObservedRequest, ObserverConfig, RequestObserver, Started},
    responder::{BufferedResponder, Responder},
    sink::{LineSink, LogSink},
};

pub const LOG_TARGET: &str = "request_observer::requests";

/// Output options plus the sink every observed request reports to.
#[derive(Clone)]
pub struct RequestLogging {
    pub config: ObserverConfig,
    sink: Arc<dyn LineSink + Send + Sync>,
}

impl RequestLogging {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            config,
            sink: Arc::new(LogSink::new(LOG_TARGET)),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LineSink + Send + Sync>) -> Self {
        self.sink = sink;
        self
    }
}

pub async fn logging_middleware(
    State(logging): State<RequestLogging>,
    req: Request,
    next: Next,
) -> Response {
    let started = Started::begin(&ObservedRequest::from_request(&req));
    logging.sink.write_line(&started.line(&logging.config));

    let response = next.run(req).await;

    started
        .finish(Some(response.status()))
        .report_completion(&logging.config, &*logging.sink);
    response
}

/// Serves a synchronous handler on the blocking pool, observed and reported
/// through `logging`.
pub fn observed_blocking<H, S>(logging: RequestLogging, handler: H) -> MethodRouter<S>
where
    H: Fn(&mut dyn Responder, &ObservedRequest) -> anyhow::Result<()>
        + Clone
        + Send
        + Sync
        + 'static,
    S: Clone + Send + Sync + 'static,
{
    any(move |req: Request| {
        let logging = logging.clone();
        let handler = handler.clone();
        async move { serve_blocking(logging, handler, req).await }
    })
}

async fn serve_blocking<H>(
    logging: RequestLogging,
    handler: H,
    req: Request,
) -> ApplicationResult<Response>
where
    H: Fn(&mut dyn Responder, &ObservedRequest) -> anyhow::Result<()> + Send + 'static,
{
    let request = ObservedRequest::from_request(&req);

    let response = tokio::task::spawn_blocking(move || {
        let mut recorder = BufferedResponder::new();
        RequestObserver::new(&mut recorder, &request, handler, logging.config)
            .run_and_report(&*logging.sink)?;
        Ok::<_, anyhow::Error>(recorder.into_response())
    })
    .await?
    .map_err(ApplicationError::handler)?;

    Ok(response)
}
