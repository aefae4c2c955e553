use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Runs one structured-output prompt and returns the parsed JSON object the
/// model produced. Models in the configured chain are tried in order.
pub async fn complete_json(
    state: &AppState,
    system_prompt: &str,
    user_content: &str,
    schema_name: &str,
    schema: Value,
) -> AppResult<Value> {
    let api_key = state
        .config
        .openai_api_key
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::ServiceUnavailable(
                "OPENAI_API_KEY is missing. Configure it in backend environment variables."
                    .to_string(),
            )
        })?;

    let model_chain = state.config.openai_model_chain();
    if model_chain.is_empty() {
        return Err(AppError::ServiceUnavailable(
            "No OpenAI model is configured.".to_string(),
        ));
    }

    let messages = vec![
        json!({ "role": "system", "content": system_prompt }),
        json!({ "role": "user", "content": user_content }),
    ];
    let response_format = json!({
        "type": "json_schema",
        "json_schema": { "name": schema_name, "strict": true, "schema": schema }
    });

    let mut last_error: Option<AppError> = None;
    for model_name in &model_chain {
        let mut payload = Map::new();
        payload.insert("model".to_string(), Value::String(model_name.clone()));
        payload.insert("messages".to_string(), Value::Array(messages.clone()));
        payload.insert("temperature".to_string(), Value::from(0.0));
        payload.insert("response_format".to_string(), response_format.clone());

        match request_completion(state, api_key, model_name, &payload).await {
            Ok(parsed) => return Ok(parsed),
            Err(error) => {
                tracing::warn!(model = %model_name, error = %error, "AI model attempt failed");
                last_error = Some(error);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| AppError::Dependency("AI provider request failed.".to_string())))
}

async fn request_completion(
    state: &AppState,
    api_key: &str,
    model_name: &str,
    payload: &Map<String, Value>,
) -> AppResult<Value> {
    let response = state
        .http_client
        .post(CHAT_COMPLETIONS_URL)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("Accept", "application/json")
        .timeout(Duration::from_secs(state.config.assist_timeout_seconds))
        .json(payload)
        .send()
        .await
        .map_err(|error| {
            tracing::error!(error = %error, model = %model_name, "AI provider is unreachable");
            AppError::Dependency("AI provider is unreachable.".to_string())
        })?;

    let status = response.status();
    let body_text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let detail = if state.config.is_production() {
            "AI provider request failed.".to_string()
        } else {
            let reason = match body_text.trim() {
                "" => status.canonical_reason().unwrap_or("unknown"),
                body => body,
            };
            format!(
                "AI provider request failed ({}) on model '{model_name}': {reason}",
                status.as_u16()
            )
        };
        return Err(AppError::Dependency(detail));
    }

    let parsed: Value = serde_json::from_str(&body_text).map_err(|_| {
        AppError::Dependency("AI provider returned an invalid JSON response.".to_string())
    })?;
    extract_json_content(&parsed)
}

/// Pulls `choices[0].message.content` and parses it as a JSON object.
fn extract_json_content(completion: &Value) -> AppResult<Value> {
    let content = completion
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AppError::Dependency("AI provider response is malformed.".to_string()))?;

    let parsed: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|_| AppError::Dependency("AI provider response is not JSON.".to_string()))?;
    if !parsed.is_object() {
        return Err(AppError::Dependency(
            "AI provider response is malformed.".to_string(),
        ));
    }
    Ok(parsed)
}

fn strip_code_fence(content: &str) -> &str {
    let Some(inner) = content.strip_prefix("```") else {
        return content;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_json_content, strip_code_fence};

    #[test]
    fn extracts_first_choice_content() {
        let completion = json!({
            "choices": [{ "message": { "content": "{\"name\":\"Ali\",\"bottles\":3}" } }]
        });
        let parsed = extract_json_content(&completion).ok();
        assert_eq!(parsed, Some(json!({ "name": "Ali", "bottles": 3 })));
    }

    #[test]
    fn rejects_non_object_content() {
        let completion = json!({ "choices": [{ "message": { "content": "[1,2]" } }] });
        assert!(extract_json_content(&completion).is_err());
        assert!(extract_json_content(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn tolerates_fenced_output() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }
}
