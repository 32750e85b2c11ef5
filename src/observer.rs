use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use axum::{
    extract::ConnectInfo,
    http::{Extensions, Method, Request, StatusCode, Uri, Version, request::Parts},
};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{
    responder::{Responder, StatusCapturingResponder},
    sink::LineSink,
};

/// Layout of the optional ` at ...` suffix on the started line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read-only view of the request being observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRequest {
    pub method: String,
    pub uri: String,
    pub remote_addr: String,
    pub protocol: String,
}

impl ObservedRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            remote_addr: String::new(),
            protocol: format!("{:?}", Version::HTTP_11),
        }
    }

    pub fn with_remote_addr(mut self, remote_addr: impl Into<String>) -> Self {
        self.remote_addr = remote_addr.into();
        self
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::build(&parts.method, &parts.uri, parts.version, &parts.extensions)
    }

    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::build(
            request.method(),
            request.uri(),
            request.version(),
            request.extensions(),
        )
    }

    fn build(method: &Method, uri: &Uri, version: Version, extensions: &Extensions) -> Self {
        let uri = uri
            .path_and_query()
            .map(|path_and_query| path_and_query.as_str())
            .filter(|path_and_query| !path_and_query.is_empty())
            .unwrap_or("/");
        let remote_addr = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        Self {
            method: method.to_string(),
            uri: uri.to_owned(),
            remote_addr,
            protocol: format!("{version:?}"),
        }
    }
}

/// Output options shared by every renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Append ` at YYYY-MM-DD HH:MM:SS` to the started line.
    pub include_timestamp: bool,
    /// Drop the ` in <duration>` suffix from the completed line.
    pub suppress_duration: bool,
    /// Blank lines written after the completed line. Only the sink reporter uses it.
    pub trailing_blank_lines: usize,
}

/// An invocation that has begun but not yet returned.
#[derive(Debug, Clone)]
pub struct Started {
    pub method: String,
    pub url: String,
    pub remote_addr: String,
    pub protocol: String,
    pub started_at: DateTime<Local>,
    instant: Instant,
}

impl Started {
    pub fn begin(request: &ObservedRequest) -> Self {
        Self {
            method: request.method.clone(),
            url: request.uri.clone(),
            remote_addr: request.remote_addr.clone(),
            protocol: request.protocol.clone(),
            started_at: Local::now(),
            instant: Instant::now(),
        }
    }

    pub fn line(&self, config: &ObserverConfig) -> String {
        let mut line = format!(
            r#"Started {} "{}" {} {}"#,
            self.method, self.url, self.remote_addr, self.protocol
        );
        if config.include_timestamp {
            line.push_str(&format!(" at {}", self.started_at.format(TIMESTAMP_FORMAT)));
        }
        line
    }

    /// Stops the clock. `None` means the handler never responded.
    pub fn finish(self, status: Option<StatusCode>) -> Observation {
        let duration = self.instant.elapsed();
        Observation {
            started: self,
            status,
            duration,
        }
    }
}

/// The outcome of one completed invocation. Rendering it never re-runs anything.
#[derive(Debug, Clone)]
pub struct Observation {
    pub started: Started,
    pub status: Option<StatusCode>,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeStrings {
    pub started: String,
    pub completed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeFields {
    pub method: String,
    pub url: String,
    pub status_code: u16,
}

impl Observation {
    /// The captured status as a number, `0` when nothing was sent.
    pub fn status_code(&self) -> u16 {
        self.status.map_or(0, |status| status.as_u16())
    }

    pub fn started_line(&self, config: &ObserverConfig) -> String {
        self.started.line(config)
    }

    pub fn completed_line(&self, config: &ObserverConfig) -> String {
        if config.suppress_duration {
            format!("Completed {}", self.status_code())
        } else {
            format!("Completed {} in {:?}", self.status_code(), self.duration)
        }
    }

    pub fn to_strings(&self, config: &ObserverConfig) -> OutcomeStrings {
        OutcomeStrings {
            started: self.started_line(config),
            completed: self.completed_line(config),
        }
    }

    pub fn to_fields(&self) -> OutcomeFields {
        OutcomeFields {
            method: self.started.method.clone(),
            url: self.started.url.clone(),
            status_code: self.status_code(),
        }
    }

    /// Writes the completed line followed by the configured blank lines.
    pub fn report_completion<S>(&self, config: &ObserverConfig, sink: &S)
    where
        S: LineSink + ?Sized,
    {
        sink.write_line(&self.completed_line(config));
        for _ in 0..config.trailing_blank_lines {
            sink.write_line("\t");
        }
    }
}

/// Times a single synchronous handler invocation and reports its status.
pub struct RequestObserver<'a, H> {
    responder: &'a mut dyn Responder,
    request: &'a ObservedRequest,
    handler: H,
    config: ObserverConfig,
}

impl<'a, H> RequestObserver<'a, H>
where
    H: FnOnce(&mut dyn Responder, &ObservedRequest) -> anyhow::Result<()>,
{
    pub fn new(
        responder: &'a mut dyn Responder,
        request: &'a ObservedRequest,
        handler: H,
        config: ObserverConfig,
    ) -> Self {
        Self {
            responder,
            request,
            handler,
            config,
        }
    }

    /// Runs the handler and returns what happened, without rendering anything.
    pub fn observe(self) -> anyhow::Result<Observation> {
        let started = Started::begin(self.request);
        self.invoke(started)
    }

    /// Writes the started line, runs the handler, then writes the completed
    /// line and any trailing blank lines. A failing handler leaves only the
    /// started line behind.
    pub fn run_and_report<S>(self, sink: &S) -> anyhow::Result<()>
    where
        S: LineSink + ?Sized,
    {
        let config = self.config;
        let started = Started::begin(self.request);
        sink.write_line(&started.line(&config));

        let observation = self.invoke(started)?;
        observation.report_completion(&config, sink);
        Ok(())
    }

    pub fn render_strings(self) -> anyhow::Result<OutcomeStrings> {
        let config = self.config;
        Ok(self.observe()?.to_strings(&config))
    }

    pub fn render_fields(self) -> anyhow::Result<OutcomeFields> {
        Ok(self.observe()?.to_fields())
    }

    fn invoke(self, started: Started) -> anyhow::Result<Observation> {
        let mut capture = StatusCapturingResponder::new(self.responder);
        (self.handler)(&mut capture, self.request)?;

        Ok(started.finish(capture.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        responder::{BufferedResponder, StreamResponder},
        sink::MemorySink,
    };
    use chrono::NaiveDateTime;
    use std::{cell::Cell, io};

    fn respond_with(
        status: StatusCode,
    ) -> impl FnOnce(&mut dyn Responder, &ObservedRequest) -> anyhow::Result<()> {
        move |responder: &mut dyn Responder, _: &ObservedRequest| {
            responder.finalize_headers(status)?;
            Ok(())
        }
    }

    #[test]
    fn reports_started_and_completed_lines() {
        let cases = [
            (StatusCode::OK, "GET", "/foo"),
            (StatusCode::UNAUTHORIZED, "POST", "/bar/create"),
            (StatusCode::NOT_FOUND, "GET", "/hello/world"),
            (StatusCode::INTERNAL_SERVER_ERROR, "GET", "/"),
            (StatusCode::SERVICE_UNAVAILABLE, "PUT", "/foo/update"),
        ];

        for (status, method, path) in cases {
            let request = ObservedRequest::new(method, path).with_remote_addr("192.0.2.1:4312");
            let mut recorder = BufferedResponder::new();
            let sink = MemorySink::new();

            RequestObserver::new(
                &mut recorder,
                &request,
                respond_with(status),
                ObserverConfig::default(),
            )
            .run_and_report(&sink)
            .unwrap();

            let lines = sink.lines();
            assert_eq!(lines.len(), 2, "{lines:?}");
            assert_eq!(
                lines[0],
                format!(r#"Started {method} "{path}" 192.0.2.1:4312 HTTP/1.1"#)
            );
            let prefix = format!("Completed {} in ", status.as_u16());
            assert!(lines[1].starts_with(&prefix), "{}", lines[1]);
            assert!(lines[1].ends_with('s'), "{}", lines[1]);
            assert_eq!(recorder.status(), status);
        }
    }

    #[test]
    fn optional_timestamp_hidden_duration_and_blank_line() {
        let request = ObservedRequest::new("GET", "/foo");
        let mut recorder = BufferedResponder::new();
        let sink = MemorySink::new();
        let config = ObserverConfig {
            include_timestamp: true,
            suppress_duration: true,
            trailing_blank_lines: 1,
        };

        RequestObserver::new(&mut recorder, &request, respond_with(StatusCode::OK), config)
            .run_and_report(&sink)
            .unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 3, "{lines:?}");

        let (head, timestamp) = lines[0].split_once(" at ").unwrap();
        assert_eq!(head, r#"Started GET "/foo"  HTTP/1.1"#);
        assert!(NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).is_ok());

        assert_eq!(lines[1], "Completed 200");
        assert_eq!(lines[2], "\t");
        assert!(!sink.contents().contains("Completed 200 in"));
    }

    #[test]
    fn renders_strings_with_same_options() {
        let request = ObservedRequest::new("PUT", "/foo/update");
        let mut recorder = BufferedResponder::new();
        let config = ObserverConfig {
            suppress_duration: true,
            trailing_blank_lines: 3,
            ..Default::default()
        };

        let strings = RequestObserver::new(
            &mut recorder,
            &request,
            respond_with(StatusCode::SERVICE_UNAVAILABLE),
            config,
        )
        .render_strings()
        .unwrap();

        assert_eq!(
            strings,
            OutcomeStrings {
                started: r#"Started PUT "/foo/update"  HTTP/1.1"#.to_owned(),
                completed: "Completed 503".to_owned(),
            }
        );
    }

    #[test]
    fn renders_fields_without_text() {
        let request = ObservedRequest::new("POST", "/bar/create");
        let mut recorder = BufferedResponder::new();

        let fields = RequestObserver::new(
            &mut recorder,
            &request,
            respond_with(StatusCode::UNAUTHORIZED),
            ObserverConfig {
                include_timestamp: true,
                ..Default::default()
            },
        )
        .render_fields()
        .unwrap();

        assert_eq!(
            fields,
            OutcomeFields {
                method: "POST".to_owned(),
                url: "/bar/create".to_owned(),
                status_code: 401,
            }
        );
        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            serde_json::json!({"method": "POST", "url": "/bar/create", "statusCode": 401})
        );
    }

    #[test]
    fn rendering_does_not_rerun_the_handler() {
        let calls = Cell::new(0);
        let request = ObservedRequest::new("GET", "/foo");
        let mut recorder = BufferedResponder::new();

        let observation = RequestObserver::new(
            &mut recorder,
            &request,
            |responder, _| {
                calls.set(calls.get() + 1);
                responder.write_body(b"hi")?;
                Ok(())
            },
            ObserverConfig::default(),
        )
        .observe()
        .unwrap();

        let config = ObserverConfig::default();
        assert_eq!(observation.to_strings(&config), observation.to_strings(&config));
        assert_eq!(observation.to_fields(), observation.to_fields());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn body_without_status_reports_ok_and_forwards_every_byte() {
        let payload = b"<h1>hello</h1>";
        let written = Cell::new(0);
        let request = ObservedRequest::new("GET", "/");
        let mut recorder = BufferedResponder::new();

        let observation = RequestObserver::new(
            &mut recorder,
            &request,
            |responder, _| {
                written.set(responder.write_body(payload)?);
                responder.write_body(b"")?;
                Ok(())
            },
            ObserverConfig::default(),
        )
        .observe()
        .unwrap();

        assert_eq!(observation.status, Some(StatusCode::OK));
        assert_eq!(written.get(), payload.len());
        assert_eq!(recorder.body(), payload);
    }

    #[test]
    fn silent_handler_reports_unset_status() {
        let request = ObservedRequest::new("HEAD", "/");
        let mut recorder = BufferedResponder::new();

        let observation = RequestObserver::new(
            &mut recorder,
            &request,
            |_, _| Ok(()),
            ObserverConfig::default(),
        )
        .observe()
        .unwrap();

        let config = ObserverConfig {
            suppress_duration: true,
            ..Default::default()
        };
        assert_eq!(observation.status, None);
        assert_eq!(observation.to_fields().status_code, 0);
        assert_eq!(observation.completed_line(&config), "Completed 0");
    }

    #[test]
    fn reported_status_matches_what_the_client_received() {
        let request = ObservedRequest::new("GET", "/late");
        let mut recorder = BufferedResponder::new();

        let observation = RequestObserver::new(
            &mut recorder,
            &request,
            |responder, _| {
                responder.write_body(b"hi")?;
                responder.finalize_headers(StatusCode::NOT_FOUND)?;
                responder.finalize_headers(StatusCode::INTERNAL_SERVER_ERROR)?;
                Ok(())
            },
            ObserverConfig::default(),
        )
        .observe()
        .unwrap();

        assert_eq!(observation.status, Some(recorder.status()));
        assert_eq!(observation.status_code(), 200);
    }

    #[test]
    fn failing_handler_only_leaves_started_line() {
        struct Closed;

        impl io::Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let request = ObservedRequest::new("GET", "/foo");
        let mut stream = StreamResponder::new(Closed);
        let sink = MemorySink::new();

        let err = RequestObserver::new(
            &mut stream,
            &request,
            |responder, _| {
                responder.write_body(b"payload")?;
                Ok(())
            },
            ObserverConfig::default(),
        )
        .run_and_report(&sink)
        .unwrap_err();

        let io_err = err.downcast_ref::<io::Error>().unwrap();
        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(sink.lines(), [r#"Started GET "/foo"  HTTP/1.1"#]);
    }

    #[test]
    fn builds_request_view_from_http_request() {
        let addr: SocketAddr = "203.0.113.7:50123".parse().unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri("http://example.com/bar/create?draft=true")
            .version(Version::HTTP_2)
            .extension(ConnectInfo(addr))
            .body(())
            .unwrap();

        assert_eq!(
            ObservedRequest::from_request(&request),
            ObservedRequest {
                method: "POST".to_owned(),
                uri: "/bar/create?draft=true".to_owned(),
                remote_addr: "203.0.113.7:50123".to_owned(),
                protocol: "HTTP/2.0".to_owned(),
            }
        );

        let (parts, ()) = Request::get("/").body(()).unwrap().into_parts();
        let view = ObservedRequest::from_parts(&parts);
        assert_eq!(view.uri, "/");
        assert_eq!(view.remote_addr, "");
        assert_eq!(view.protocol, "HTTP/1.1");
    }
}
