//! Request/response session between the host and one engine
//!
//! The [`Agent`] owns a [`Handler`] and answers host requests strictly one at
//! a time. Configuration and restore failures come back as unsuccessful
//! responses; an unsupported input shape fails the whole session, after which
//! every request is refused.
//!
//! # Example
//!
//! ```
//! use groupflow::agent::{Agent, Request, Response};
//! use groupflow::config::OptionSetting;
//! use groupflow::ema::EmaEngine;
//! use groupflow::point::Point;
//!
//! let mut agent = Agent::new(EmaEngine::new());
//!
//! let init = agent
//!     .handle(Request::Init(vec![
//!         OptionSetting::string("field", "value"),
//!         OptionSetting::int("size", 3),
//!         OptionSetting::double("alpha", 0.5),
//!     ]))
//!     .unwrap();
//! assert!(matches!(init[0], Response::Init(ref r) if r.success));
//!
//! let out = agent
//!     .handle(Request::Point(Point::new("m", "a", 1).with_double("value", 2.0)))
//!     .unwrap();
//! assert_eq!(out.len(), 1);
//! ```

use crate::config::OptionSetting;
use crate::error::EngineError;
use crate::point::{BeginBatch, EndBatch, Output, Point};
use crate::traits::{EngineInfo, Handler};
use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use std::{string::String, string::ToString, vec, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{string::String, string::ToString, vec, vec::Vec};

/// Message from the host
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Info,
    Init(Vec<OptionSetting>),
    Snapshot,
    Restore(Vec<u8>),
    /// Liveness probe carrying the host's clock
    KeepAlive(i64),
    BeginBatch(BeginBatch),
    Point(Point),
    EndBatch(EndBatch),
}

/// Result of an initialization attempt
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResponse {
    pub success: bool,
    /// Combined problem description, empty on success
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub success: bool,
    pub error: String,
}

/// Message to the host
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Info(EngineInfo),
    Init(InitResponse),
    Snapshot(SnapshotResponse),
    Restore(RestoreResponse),
    KeepAlive(i64),
    BeginBatch(BeginBatch),
    Point(Point),
    EndBatch(EndBatch),
    /// Non-fatal failure the host should log
    Error(String),
}

impl From<Output> for Response {
    fn from(output: Output) -> Self {
        match output {
            Output::Point(p) => Response::Point(p),
            Output::BeginBatch(b) => Response::BeginBatch(b),
            Output::EndBatch(e) => Response::EndBatch(e),
        }
    }
}

/// Drives one engine through a host session
#[derive(Debug)]
pub struct Agent<H> {
    handler: H,
    failure: Option<String>,
}

impl<H: Handler> Agent<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            failure: None,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Whether a fatal error ended the session
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Answer one request
    ///
    /// Fatal errors are returned once and then reported as
    /// [`EngineError::SessionFailed`] for every later request.
    pub fn handle(&mut self, request: Request) -> Result<Vec<Response>, EngineError> {
        if let Some(reason) = &self.failure {
            return Err(EngineError::SessionFailed(reason.clone()));
        }

        let result = self.dispatch(request);
        if let Err(e) = &result {
            if e.is_fatal() {
                log::error!("session failed: {}", e);
                self.failure = Some(e.to_string());
            }
        }
        result
    }

    fn dispatch(&mut self, request: Request) -> Result<Vec<Response>, EngineError> {
        match request {
            Request::Info => Ok(vec![Response::Info(self.handler.info())]),
            Request::Init(options) => {
                let response = match self.handler.init(&options) {
                    Ok(()) => InitResponse {
                        success: true,
                        error: String::new(),
                    },
                    Err(e) => InitResponse {
                        success: false,
                        error: e.to_string(),
                    },
                };
                Ok(vec![Response::Init(response)])
            }
            Request::Snapshot => match self.handler.snapshot() {
                Ok(snapshot) => Ok(vec![Response::Snapshot(SnapshotResponse { snapshot })]),
                Err(e) => {
                    log::error!("{}", e);
                    Ok(vec![Response::Error(e.to_string())])
                }
            },
            Request::Restore(blob) => {
                let response = match self.handler.restore(&blob) {
                    Ok(()) => RestoreResponse {
                        success: true,
                        error: String::new(),
                    },
                    Err(e) => {
                        log::warn!("restore rejected: {}", e);
                        RestoreResponse {
                            success: false,
                            error: e.to_string(),
                        }
                    }
                };
                Ok(vec![Response::Restore(response)])
            }
            Request::KeepAlive(time) => Ok(vec![Response::KeepAlive(time)]),
            Request::BeginBatch(begin) => {
                self.handler.begin_batch(&begin)?;
                Ok(Vec::new())
            }
            Request::EndBatch(end) => {
                self.handler.end_batch(&end)?;
                Ok(Vec::new())
            }
            Request::Point(point) => {
                let mut out = Vec::new();
                self.handler.point(point, &mut out)?;
                Ok(out.into_iter().map(Response::from).collect())
            }
        }
    }
}
