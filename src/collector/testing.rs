//! In-memory controller and sink used by the collector tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::client::{ClientError, Controller, RestClient};
use crate::storage::{Point, StorageError, TimeSeriesSink};

/// A recorded request: method, path and optional body.
pub(crate) type Call = (&'static str, String, Option<Value>);

/// Answers from a fixed path → body table; unknown paths answer 404.
#[derive(Default)]
pub(crate) struct StubClient {
    responses: HashMap<String, Value>,
    calls: Mutex<Vec<Call>>,
}

impl StubClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, path: impl Into<String>, body: Value) -> Self {
        self.responses.insert(path.into(), body);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(
        &self,
        method: &'static str,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push((method, path.to_string(), body));
        self.responses
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::request(path, Some(404), "not found"))
    }
}

#[async_trait::async_trait]
impl RestClient for StubClient {
    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.answer("GET", path, None)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.answer("POST", path, Some(body.clone()))
    }
}

/// Controller whose session handshake can be made to fail.
pub(crate) struct MockController {
    pub(crate) stub: StubClient,
    pub(crate) connects: usize,
    pub(crate) fail_connect: bool,
}

impl MockController {
    pub(crate) fn new(stub: StubClient) -> Self {
        Self {
            stub,
            connects: 0,
            fail_connect: false,
        }
    }
}

#[async_trait::async_trait]
impl RestClient for MockController {
    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.stub.get(path).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.stub.post(path, body).await
    }
}

#[async_trait::async_trait]
impl Controller for MockController {
    async fn connect(&mut self) -> Result<(), ClientError> {
        self.connects += 1;
        if self.fail_connect {
            return Err(ClientError::Login {
                address: "10.0.0.1".to_string(),
                reason: "status 401".to_string(),
            });
        }
        Ok(())
    }
}

/// Sink that keeps every written batch.
#[derive(Default)]
pub(crate) struct MemorySink {
    writes: Mutex<Vec<Vec<Point>>>,
    pub(crate) fail_connect: bool,
}

impl MemorySink {
    pub(crate) fn batches(&self) -> Vec<Vec<Point>> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TimeSeriesSink for MemorySink {
    async fn connect(&mut self) -> Result<(), StorageError> {
        if self.fail_connect {
            return Err(StorageError::Connection("refused".to_string()));
        }
        Ok(())
    }

    async fn write(&self, points: &[Point]) -> Result<(), StorageError> {
        self.writes.lock().unwrap().push(points.to_vec());
        Ok(())
    }
}
