//! Request logging for HTTP handlers.
//!
//! A handler runs against a [`StatusCapturingResponder`], which forwards
//! everything to the real responder while remembering the status it sent. The
//! [`RequestObserver`] times that invocation and renders the outcome as log
//! lines, as a pair of strings, or as structured fields.

pub mod error;
pub mod middleware;
pub mod observer;
pub mod responder;
pub mod sink;

pub use middleware::{RequestLogging, logging_middleware, observed_blocking};
pub use observer::{
    Observation, ObservedRequest, ObserverConfig, OutcomeFields, OutcomeStrings, RequestObserver,
    Started,
};
pub use responder::{BufferedResponder, Responder, StatusCapturingResponder, StreamResponder};
pub use sink::{LineSink, LogSink, MemorySink};
