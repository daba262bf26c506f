//! Scripted backend for unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{InferenceBackend, InferenceError};

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Reply(&'static str),
    Fail(&'static str),
    /// Never answers
    Hang,
}

/// Backend answering per model; unknown models echo the prompt
#[derive(Default)]
pub struct ScriptedBackend {
    behaviors: HashMap<String, Behavior>,
    failing_unloads: Vec<String>,
    calls: Mutex<Vec<String>>,
    unloads: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn with(mut self, model: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(model.to_owned(), behavior);
        self
    }

    pub fn failing_unload(mut self, model: &str) -> Self {
        self.failing_unloads.push(model.to_owned());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn unloads(&self) -> Vec<String> {
        self.unloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, model: &str, prompt: &str, _timeout: Duration) -> Result<String, InferenceError> {
        self.calls.lock().unwrap().push(model.to_owned());

        match self.behaviors.get(model).copied() {
            Some(Behavior::Reply(text)) => Ok(text.to_owned()),
            Some(Behavior::Fail(message)) => Err(InferenceError::unavailable(model, message)),
            Some(Behavior::Hang) => std::future::pending().await,
            None => Ok(format!("{model}: {prompt}")),
        }
    }

    async fn unload(&self, model: &str) -> Result<(), InferenceError> {
        self.unloads.lock().unwrap().push(model.to_owned());

        if self.failing_unloads.iter().any(|m| m == model) {
            return Err(InferenceError::unavailable(model, "unload refused"));
        }
        Ok(())
    }

    async fn is_available(&self, model: &str) -> Result<bool, InferenceError> {
        Ok(!matches!(self.behaviors.get(model), Some(Behavior::Fail(_))))
    }
}
