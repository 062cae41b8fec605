use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{ModelBoundary, ModelRequest, ModelTurn};
use super::QueryError;

/// Mock model for testing: replays queued turns and records every request.
pub struct MockModel {
    turns: Mutex<VecDeque<Result<ModelTurn, QueryError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A mock whose single turn is `text`.
    pub fn replying(text: &str) -> Self {
        Self::new().then(ModelTurn::Text(text.to_string()))
    }

    pub fn then(self, turn: ModelTurn) -> Self {
        self.turns.lock().unwrap().push_back(Ok(turn));
        self
    }

    pub fn then_fail(self, error: QueryError) -> Self {
        self.turns.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBoundary for MockModel {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelTurn, QueryError> {
        self.requests.lock().unwrap().push(request.clone());
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ModelTurn::Empty))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
