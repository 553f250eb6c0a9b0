//! Structured post metadata carried in an invisible embed.
//!
//! The payload is JSON, base64-encoded, split across embed fields whose name
//! is a zero-width space. The embed uses the dark-theme background colour so
//! it is practically invisible, and its footer reads
//! `metadata:v1:chunks=<n>`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::message::Embed;

/// Background colour of the metadata carrier embed (`#2b2d31`).
pub const METADATA_EMBED_COLOUR: u32 = 0x2B_2D_31;
/// Footer prefix identifying a metadata carrier.
pub const METADATA_FOOTER_PREFIX: &str = "metadata:";
/// Name of every chunk field.
pub const METADATA_FIELD_NAME: &str = "\u{200b}";
/// Discord caps field values at 1024 chars; stay below.
pub const METADATA_CHUNK_SIZE: usize = 950;
/// Discord caps embeds at 25 fields.
pub const METADATA_MAX_CHUNKS: usize = 25;

/// Machine-readable description of a translation post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetadata {
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub traductor: Option<String>,
    #[serde(default)]
    pub game_version: String,
    #[serde(default)]
    pub translate_version: String,
    #[serde(default)]
    pub is_integrated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_link: Option<String>,
}

/// Errors raised while decoding a metadata payload.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Payload is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PostMetadata {
    /// Encode as base64 JSON.
    pub fn to_base64(&self) -> Result<String, MetadataError> {
        let json = serde_json::to_string(self)?;
        Ok(STANDARD.encode(json.as_bytes()))
    }

    /// Decode a base64 payload, tolerating missing padding and surrounding
    /// whitespace. A percent-encoded JSON body is accepted as a fallback.
    pub fn from_base64(payload: &str) -> Result<Self, MetadataError> {
        let mut trimmed: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let missing = (4 - trimmed.len() % 4) % 4;
        trimmed.extend(std::iter::repeat_n('=', missing));

        let raw = String::from_utf8(STANDARD.decode(trimmed.as_bytes())?)?;
        match serde_json::from_str(&raw) {
            Ok(meta) => Ok(meta),
            Err(json_err) => match urlencoding::decode(&raw) {
                Ok(decoded) => Ok(serde_json::from_str(&decoded)?),
                Err(_) => Err(json_err.into()),
            },
        }
    }

    /// Translator name, `None` when blank.
    pub fn translator(&self) -> Option<&str> {
        self.traductor
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Whether an embed is a metadata carrier rather than visible content.
pub fn is_metadata_embed(embed: &Embed) -> bool {
    embed.colour == Some(METADATA_EMBED_COLOUR)
        || embed
            .footer
            .as_deref()
            .is_some_and(|f| f.starts_with(METADATA_FOOTER_PREFIX))
}

/// Find and decode the first metadata embed. Malformed payloads yield `None`.
pub fn find_metadata(embeds: &[Embed]) -> Option<PostMetadata> {
    embeds
        .iter()
        .filter(|embed| {
            embed
                .footer
                .as_deref()
                .is_some_and(|f| f.starts_with(METADATA_FOOTER_PREFIX))
        })
        .find_map(|embed| {
            let payload: String = embed
                .fields
                .iter()
                .filter(|field| field.name == METADATA_FIELD_NAME)
                .map(|field| field.value.as_str())
                .collect();
            if payload.is_empty() {
                return None;
            }
            match PostMetadata::from_base64(&payload) {
                Ok(meta) => Some(meta),
                Err(err) => {
                    tracing::debug!("ignoring malformed metadata embed: {err}");
                    None
                }
            }
        })
}

/// Split an encoded payload into embed field chunks.
pub fn chunk_payload(payload: &str) -> Vec<String> {
    let chars: Vec<char> = payload.chars().collect();
    chars
        .chunks(METADATA_CHUNK_SIZE)
        .take(METADATA_MAX_CHUNKS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Footer text for a carrier holding `chunks` fields.
pub fn metadata_footer(chunks: usize) -> String {
    format!("{METADATA_FOOTER_PREFIX}v1:chunks={chunks}")
}
