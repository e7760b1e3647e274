use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::llm::GenerationSettings;

/// One non-streaming chat turn: a system prompt, a user prompt and an
/// optional `(name, schema)` pair requesting schema-constrained JSON.
pub struct ChatCall<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub settings: GenerationSettings,
    pub format: Option<(&'a str, &'a Value)>,
}

/// Run a chat completion against the configured provider and return the
/// assistant message content.
pub async fn chat(client: &reqwest::Client, config: &LlmConfig, call: ChatCall<'_>) -> Result<String> {
    match config.provider.as_str() {
        "ollama" => call_ollama(client, config, &call).await,
        "openai" => call_openai(client, config, &call).await,
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    }
}

/// Parse a structured-output message. Some models wrap JSON in a markdown
/// fence even when a schema is requested.
pub fn parse_json_content(content: &str) -> Result<Value> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(unfenced).with_context(|| {
        format!(
            "Structured output was not valid JSON: {}",
            unfenced.chars().take(200).collect::<String>()
        )
    })
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

fn messages(call: &ChatCall<'_>) -> Vec<Message> {
    vec![
        Message {
            role: "system".to_string(),
            content: call.system_prompt.to_string(),
        },
        Message {
            role: "user".to_string(),
            content: call.user_prompt.to_string(),
        },
    ]
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    call: &ChatCall<'_>,
) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url);

    let req = OllamaChatRequest {
        model: config.chat_model.clone(),
        messages: messages(call),
        stream: false,
        options: OllamaOptions {
            temperature: call.settings.temperature,
            num_predict: call.settings.max_tokens,
        },
        format: call.format.map(|(_, schema)| schema.clone()),
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama chat response")?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    call: &ChatCall<'_>,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages: messages(call),
        temperature: call.settings.temperature,
        max_tokens: call.settings.max_tokens,
        response_format: call.format.map(|(name, schema)| {
            json!({
                "type": "json_schema",
                "json_schema": { "name": name, "schema": schema },
            })
        }),
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI chat response")?;
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("OpenAI chat API returned no content")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let v = parse_json_content(r#"{"ideas": []}"#).unwrap();
        assert_eq!(v, json!({"ideas": []}));
    }

    #[test]
    fn test_parse_fenced_json() {
        let v = parse_json_content("```json\n{\"title\": \"x\"}\n```").unwrap();
        assert_eq!(v["title"], "x");
        let v = parse_json_content("```\n[1, 2]\n```").unwrap();
        assert_eq!(v, json!([1, 2]));
    }

    #[test]
    fn test_parse_prose_is_an_error() {
        let err = parse_json_content("Sure! Here are the ideas you asked for.").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_openai_request_shape() {
        let schema = json!({"type": "object"});
        let call = ChatCall {
            system_prompt: "sys",
            user_prompt: "usr",
            settings: GenerationSettings::new(0.1, 512),
            format: Some(("ideas", &schema)),
        };
        let req = OpenAiChatRequest {
            model: "m".into(),
            messages: messages(&call),
            temperature: call.settings.temperature,
            max_tokens: call.settings.max_tokens,
            response_format: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "usr");
        assert_eq!(v["max_tokens"], 512);
        assert!(v.get("response_format").is_none());
    }
}
