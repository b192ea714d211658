use std::sync::Mutex;

use async_trait::async_trait;

use crate::{LlmAdapter, LlmCallOptions, LlmError, LlmMessage, LlmResponse, ToolDescriptor};

/// Returns a scripted sequence of responses, one per call, for exercising
/// the conversation manager's two-phase loop without a real provider.
pub struct ScriptedAdapter {
    responses: Mutex<Vec<Result<LlmResponse, LlmError>>>,
}

impl ScriptedAdapter {
    pub fn new(responses: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
        }
    }
}

#[async_trait]
impl LlmAdapter for ScriptedAdapter {
    async fn complete(
        &self,
        _messages: &[LlmMessage],
        _tools: &[ToolDescriptor],
        _options: LlmCallOptions,
    ) -> Result<LlmResponse, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(LlmError("no more scripted responses".to_string())))
    }
}
