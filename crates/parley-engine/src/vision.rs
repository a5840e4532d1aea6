// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image description for models that cannot read images themselves.

use std::sync::Arc;

use parley_core::types::{ChatMessage, CompletionRequest, Role};
use parley_core::LlmClient;
use tracing::{debug, warn};

const DESCRIBE_INSTRUCTION: &str = "请简要描述输入图片的内容，优先描述图片上的文字，其次概括图片内容。你的描述会作为提示词给另一个不支持视觉模型进行理解。请根据用户输入来更好地描述图片，以下是用户的输入：";
const DESCRIPTION_PREFIX: &str = "用户上传了一张图片，以下是一个视觉模型对图片的描述：";
const FAILURE_PREFIX: &str = "识图失败：";

/// Asks a vision model on the secondary endpoint to describe an image.
#[derive(Clone)]
pub struct VisionDescriber {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl VisionDescriber {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Text standing in for `image` in the user turn.
    ///
    /// Never fails: an upstream error is reported inside the returned text
    /// so the main model can tell the user the image could not be read.
    pub async fn describe(&self, image: &str, prompt: &str) -> String {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: format!("{DESCRIBE_INSTRUCTION}{prompt}"),
                reasoning_content: None,
                image_url: Some(image.to_string()),
            }],
        };

        match self.client.complete(request).await {
            Ok(response) => {
                debug!(model = %self.model, chars = response.content.len(), "image described");
                format!("{DESCRIPTION_PREFIX}{}", response.content)
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "image description failed");
                format!("{FAILURE_PREFIX}{e}")
            }
        }
    }
}
