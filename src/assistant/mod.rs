//! Tenant knowledge base and the chat assistant answering from it.

pub mod knowledge;
pub mod llm;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::session::CurrentTenant;
use crate::core::shared::envelope::{ok, ApiResult};
use crate::core::shared::error::ApiError;
use crate::core::shared::extract::ApiJson;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::estimate_token_count;
use crate::core::urls::ApiUrls;

pub use knowledge::{KnowledgeChunk, KnowledgeDocument};
pub use llm::{AssistantError, ChatMessage, ChatModel, OpenAiClient, Role};

const MAX_HISTORY: usize = 10;
const MAX_MESSAGE_CHARS: usize = 4_000;
const MAX_DOCUMENT_CHARS: usize = 200_000;

pub fn assistant_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::KNOWLEDGE, get(list_documents).post(add_document))
        .route(ApiUrls::KNOWLEDGE_BY_ID, delete(delete_document))
        .route(ApiUrls::ASSISTANT_CHAT, post(chat))
}

impl From<AssistantError> for ApiError {
    fn from(err: AssistantError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
) -> ApiResult<Vec<KnowledgeDocument>> {
    let mut docs: Vec<KnowledgeDocument> = state.repo.list(current.id()).await?;
    docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    ok(docs)
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentRequest {
    pub title: String,
    pub content: String,
}

async fn add_document(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<AddDocumentRequest>,
) -> ApiResult<KnowledgeDocument> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }
    let char_count = req.content.chars().count();
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Content is required".to_string()));
    }
    if char_count > MAX_DOCUMENT_CHARS {
        return Err(ApiError::Validation(format!(
            "Documents are limited to {MAX_DOCUMENT_CHARS} characters"
        )));
    }

    let tenant_id = current.id();
    let id = uuid::Uuid::new_v4().to_string();
    let chunks = knowledge::chunks_for(tenant_id, &id, &req.content);
    for chunk in &chunks {
        state.repo.put(tenant_id, chunk).await?;
    }

    let doc = KnowledgeDocument {
        id,
        title: title.to_string(),
        chunk_count: chunks.len(),
        char_count,
        created_at: Utc::now(),
    };
    state.repo.put(tenant_id, &doc).await?;
    info!(
        "Indexed knowledge document {} ({} chunks) for tenant {tenant_id}",
        doc.id, doc.chunk_count
    );
    ok(doc)
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let tenant_id = current.id();
    if !state.repo.delete::<KnowledgeDocument>(tenant_id, &id).await? {
        return Err(ApiError::not_found("Document"));
    }

    let chunks: Vec<KnowledgeChunk> = state
        .repo
        .list_by_index(&knowledge::document_index_key(tenant_id, &id))
        .await?;
    for chunk in chunks {
        if let Err(e) = state.repo.delete::<KnowledgeChunk>(tenant_id, &chunk.id).await {
            warn!("Failed to delete chunk {}: {e}", chunk.id);
        }
    }
    ok(true)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSource {
    pub document_id: String,
    pub position: usize,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub sources: Vec<ChatSource>,
}

pub fn build_messages(
    business_name: &str,
    context: &[&KnowledgeChunk],
    history: &[ChatMessage],
    message: &str,
) -> Vec<ChatMessage> {
    let mut system = format!(
        "You are the assistant for {business_name}. Answer questions from visitors \
         politely and briefly. If the answer is not in the provided information, say \
         you don't know and suggest contacting {business_name} directly."
    );
    if !context.is_empty() {
        system.push_str("\n\nBusiness information:");
        for chunk in context {
            system.push_str("\n---\n");
            system.push_str(&chunk.text);
        }
    }

    let mut messages = vec![ChatMessage::system(system)];
    let skip = history.len().saturating_sub(MAX_HISTORY);
    messages.extend(
        history
            .iter()
            .skip(skip)
            .filter(|m| m.role != Role::System)
            .cloned(),
    );
    messages.push(ChatMessage::user(message));
    messages
}

async fn chat(
    State(state): State<Arc<AppState>>,
    current: CurrentTenant,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::Validation("Message is required".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation("Message is too long".to_string()));
    }

    let chunks: Vec<KnowledgeChunk> = state.repo.list(current.id()).await?;
    let hits = knowledge::retrieve(&chunks, message, knowledge::TOP_CHUNKS);
    let messages = build_messages(&current.tenant.name, &hits, &req.history, message);
    debug!(
        "Assistant prompt for tenant {}: {} messages, ~{} tokens",
        current.id(),
        messages.len(),
        messages
            .iter()
            .map(|m| estimate_token_count(&m.content))
            .sum::<usize>()
    );

    let reply = state.assistant.complete(&messages).await?;
    ok(ChatResponse {
        reply,
        sources: hits
            .iter()
            .map(|c| ChatSource {
                document_id: c.document_id.clone(),
                position: c.position,
            })
            .collect(),
    })
}
