use std::io::{self, Write};

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use log::warn;

/// The surface a handler writes an HTTP response through.
///
/// Headers may be mutated freely until [`Responder::finalize_headers`] locks in
/// the status line. A body write before finalization implies a `200 OK`.
pub trait Responder {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn finalize_headers(&mut self, status: StatusCode) -> io::Result<()>;

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<usize>;
}

/// Pass-through wrapper that remembers the status code sent through it.
///
/// Every call is forwarded untouched to the wrapped responder, including its
/// errors. Only the first status is ever recorded, whether it comes from
/// `finalize_headers` or from a body write implying `200`.
pub struct StatusCapturingResponder<'a> {
    inner: &'a mut dyn Responder,
    status: Option<StatusCode>,
}

impl<'a> StatusCapturingResponder<'a> {
    pub fn new(inner: &'a mut dyn Responder) -> Self {
        Self {
            inner,
            status: None,
        }
    }

    /// The captured status, or `None` if the handler has not responded yet.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl Responder for StatusCapturingResponder<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn finalize_headers(&mut self, status: StatusCode) -> io::Result<()> {
        if self.status.is_none() {
            self.status = Some(status);
        }
        self.inner.finalize_headers(status)
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.inner.write_body(bytes)
    }
}

/// In-memory responder which records everything written to it.
#[derive(Debug, Default)]
pub struct BufferedResponder {
    headers: HeaderMap,
    sent: Option<(StatusCode, HeaderMap)>,
    body: Vec<u8>,
}

impl BufferedResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status sent to the client. Defaults to `200` when nothing was finalized.
    pub fn status(&self) -> StatusCode {
        self.sent
            .as_ref()
            .map(|(status, _)| *status)
            .unwrap_or(StatusCode::OK)
    }

    /// Headers as they were when the response was finalized.
    pub fn headers(&self) -> &HeaderMap {
        match &self.sent {
            Some((_, headers)) => headers,
            None => &self.headers,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let (status, headers) = self
            .sent
            .unwrap_or_else(|| (StatusCode::OK, self.headers));

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl Responder for BufferedResponder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn finalize_headers(&mut self, status: StatusCode) -> io::Result<()> {
        if let Some((sent, _)) = &self.sent {
            warn!("Ignoring superfluous status {status}, {sent} was already sent");
            return Ok(());
        }

        self.sent = Some((status, self.headers.clone()));
        Ok(())
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if self.sent.is_none() {
            self.finalize_headers(StatusCode::OK)?;
        }

        self.body.extend_from_slice(bytes);
        Ok(bytes.len())
    }
}

/// Responder writing a raw HTTP/1.1 response onto a byte stream.
#[derive(Debug)]
pub struct StreamResponder<W> {
    stream: W,
    headers: HeaderMap,
    finalized: bool,
}

impl<W: Write> StreamResponder<W> {
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            headers: HeaderMap::new(),
            finalized: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.stream
    }
}

impl<W: Write> Responder for StreamResponder<W> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn finalize_headers(&mut self, status: StatusCode) -> io::Result<()> {
        if self.finalized {
            warn!("Ignoring superfluous status {status}, headers were already written");
            return Ok(());
        }

        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )
        .into_bytes();
        for (name, value) in &self.headers {
            head.extend_from_slice(name.as_str().as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        }
        head.extend_from_slice(b"\r\n");

        self.stream.write_all(&head)?;
        self.finalized = true;
        Ok(())
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if !self.finalized {
            self.finalize_headers(StatusCode::OK)?;
        }

        self.stream.write_all(bytes)?;
        Ok(bytes.len())
    }
}
