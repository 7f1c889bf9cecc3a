use std::sync::Arc;

use actix_web::{post, web, Error, HttpResponse, Responder};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, CreateChatCompletionStreamResponse,
};
use bytes::Bytes;
use futures::stream::StreamExt;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::middleware::auth::AuthenticatedUser;
use crate::prompts::Prompts;
use crate::AppState;

#[derive(Deserialize, ToSchema)]
pub struct VowRequest {
    pub partner_name: String,
    pub relationship_details: String,
    pub tone: Option<String>,
}

/// Marketing tool: drafts wedding vows and streams the text back as it is
/// generated. One random example pair seeds the style.
#[post("/generate")]
pub async fn generate_vows(
    app_state: web::Data<Arc<AppState>>,
    _authenticated_user: AuthenticatedUser,
    body: web::Json<VowRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let request = body.into_inner();
    if request.partner_name.trim().is_empty() {
        return Err(actix_web::error::ErrorBadRequest("Partner name is required"));
    }

    info!("Vow generation request");

    let tone = request.tone.as_deref().unwrap_or("heartfelt");
    let example = Prompts::VOW_EXAMPLES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(Prompts::VOW_EXAMPLES[0]);

    let messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(Prompts::VOW_SYSTEM)
            .build()
            .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(example.0)
            .build()
            .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
            .into(),
        ChatCompletionRequestAssistantMessageArgs::default()
            .content(example.1)
            .build()
            .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(Prompts::vow_user_prompt(
                request.partner_name.trim(),
                request.relationship_details.trim(),
                tone,
            ))
            .build()
            .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
            .into(),
    ];

    let completion_request = CreateChatCompletionRequestArgs::default()
        .max_tokens(700u32)
        .model("gpt-4o")
        .messages(messages)
        .build()
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let response = app_state
        .oai_client
        .chat()
        .create_stream(completion_request)
        .await
        .map_err(|e| {
            error!("Failed to start vow completion stream: {:?}", e);
            actix_web::error::ErrorInternalServerError(e.to_string())
        })?;

    let stream: futures::stream::BoxStream<Result<Bytes, Error>> = response
        .map(
            |item_result: Result<CreateChatCompletionStreamResponse, OpenAIError>| {
                match item_result {
                    Ok(item) => {
                        let chunk: String = item
                            .choices
                            .iter()
                            .filter_map(|choice| choice.delta.content.as_deref())
                            .collect();
                        Ok(Bytes::from(chunk))
                    }
                    Err(e) => Err(actix_web::error::ErrorInternalServerError(e.to_string())),
                }
            },
        )
        .boxed();

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .streaming(stream))
}
