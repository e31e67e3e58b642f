//! Tenant knowledge base: documents split into paragraph chunks and a simple
//! term-overlap retriever over them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::shared::utils::search_terms;
use crate::storage::Entity;

pub const CHUNK_SIZE: usize = 800;
pub const TOP_CHUNKS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    pub chunk_count: usize,
    pub char_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Entity for KnowledgeDocument {
    const KIND: &'static str = "KDOC";

    fn entity_id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeChunk {
    pub id: String,
    pub tenant_id: String,
    pub document_id: String,
    pub position: usize,
    pub text: String,
}

impl Entity for KnowledgeChunk {
    const KIND: &'static str = "KCHUNK";

    fn entity_id(&self) -> String {
        self.id.clone()
    }

    fn index_key(&self) -> Option<String> {
        Some(document_index_key(&self.tenant_id, &self.document_id))
    }
}

pub fn document_index_key(tenant_id: &str, document_id: &str) -> String {
    format!("DOC#{tenant_id}#{document_id}")
}

pub fn chunks_for(tenant_id: &str, document_id: &str, content: &str) -> Vec<KnowledgeChunk> {
    chunk_text(content, CHUNK_SIZE)
        .into_iter()
        .enumerate()
        .map(|(position, text)| KnowledgeChunk {
            id: format!("{document_id}-{position:04}"),
            tenant_id: tenant_id.to_string(),
            document_id: document_id.to_string(),
            position,
            text,
        })
        .collect()
}

/// Packs whole paragraphs into chunks of at most `max_chars` characters.
/// A paragraph longer than that is cut at word boundaries.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        for piece in split_long(paragraph, max_chars) {
            let needed = if current.is_empty() {
                piece.chars().count()
            } else {
                current.chars().count() + 2 + piece.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long(paragraph: &str, max_chars: usize) -> Vec<String> {
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        let len = current.chars().count();
        if len > 0 && len + 1 + word.chars().count() > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// The `limit` chunks sharing the most distinct terms with `question`.
/// Chunks with no shared term are never returned.
pub fn retrieve<'a>(
    chunks: &'a [KnowledgeChunk],
    question: &str,
    limit: usize,
) -> Vec<&'a KnowledgeChunk> {
    let terms: HashSet<String> = search_terms(question).into_iter().collect();
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &KnowledgeChunk)> = chunks
        .iter()
        .filter_map(|chunk| {
            let words: HashSet<String> = search_terms(&chunk.text).into_iter().collect();
            let score = terms.intersection(&words).count();
            (score > 0).then_some((score, chunk))
        })
        .collect();

    scored.sort_by(|(a_score, a), (b_score, b)| {
        b_score
            .cmp(a_score)
            .then_with(|| a.document_id.cmp(&b.document_id))
            .then_with(|| a.position.cmp(&b.position))
    });
    scored.into_iter().take(limit).map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_paragraphs_share_a_chunk() {
        let chunks = chunk_text("First.\n\nSecond.\n\n\n\nThird.", 800);
        assert_eq!(chunks, vec!["First.\n\nSecond.\n\nThird."]);
    }

    #[test]
    fn test_chunks_respect_limit() {
        let para = "word ".repeat(60);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = chunk_text(&text, 800);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 800));

        let long = "lorem ".repeat(400);
        let pieces = chunk_text(&long, 800);
        assert!(pieces.len() >= 3);
        assert!(pieces.iter().all(|c| c.chars().count() <= 800));
        assert!(pieces.iter().all(|c| !c.starts_with(' ') && !c.ends_with(' ')));
    }

    #[test]
    fn test_retrieve_ranks_by_overlap() {
        let chunks = chunks_for(
            "t1",
            "doc",
            "Classes run every morning at seven.\n\nCancellation is free up to 24 hours before class.\n\nParking is behind the studio.",
        );
        assert_eq!(chunks.len(), 1);

        let mut separate: Vec<KnowledgeChunk> = [
            "Classes run every morning.",
            "Cancellation is free up to 24 hours before class.",
            "Parking is behind the studio.",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| KnowledgeChunk {
            id: format!("d-{i}"),
            tenant_id: "t1".to_string(),
            document_id: "d".to_string(),
            position: i,
            text: text.to_string(),
        })
        .collect();
        separate.extend(chunks);

        let hits = retrieve(&separate, "What is the cancellation policy for a class?", 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document_id, "doc");
        assert_eq!(hits[1].document_id, "d");
        assert_eq!(hits[1].position, 1);

        assert!(retrieve(&separate, "zebra", 4).is_empty());
        assert!(retrieve(&separate, "a ?", 4).is_empty());
    }

    #[test]
    fn test_chunk_index_is_tenant_scoped() {
        let chunks = chunks_for("t1", "doc-9", "Hello there.");
        assert_eq!(chunks[0].id, "doc-9-0000");
        assert_eq!(chunks[0].index_key().as_deref(), Some("DOC#t1#doc-9"));
    }
}
