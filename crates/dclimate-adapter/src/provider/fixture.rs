//! In-memory fetch capability with canned responses.
//!
//! Serves the same response for every call to an endpoint key and records
//! each call descriptor it receives so tests can assert on what reached the
//! provider.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{FetchCapability, FetchError, FetchResponse};
use crate::grammar::CallDescriptor;

#[derive(Debug, Clone)]
enum Canned {
    Reply(FetchResponse),
    Failure(String),
}

#[derive(Debug, Default)]
pub struct FixtureCapability {
    responses: Mutex<HashMap<String, Canned>>,
    calls: Mutex<Vec<CallDescriptor>>,
}

impl FixtureCapability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls to `key` with `response`.
    pub fn respond(self, key: &str, response: FetchResponse) -> Self {
        self.set(key, Canned::Reply(response));
        self
    }

    /// Fail calls to `key` with a transport error carrying `message`.
    pub fn fail(self, key: &str, message: &str) -> Self {
        self.set(key, Canned::Failure(message.to_string()));
        self
    }

    fn set(&self, key: &str, canned: Canned) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(key.to_string(), canned);
        }
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<CallDescriptor> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FetchCapability for FixtureCapability {
    async fn fetch(&self, call: &CallDescriptor) -> Result<FetchResponse, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        let canned = self
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(&call.endpoint_key).cloned());
        match canned {
            Some(Canned::Reply(response)) => Ok(response),
            Some(Canned::Failure(message)) => Err(FetchError::Transport(message)),
            None => Err(FetchError::NoData),
        }
    }
}
