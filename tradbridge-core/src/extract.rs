//! Derive announcement fields from a thread's starter message.
//!
//! Structured metadata wins when present and well formed. Otherwise every
//! field comes from fixed French text markers, with the thread name as the
//! last resort. Extraction never fails: missing data resolves to defaults.

use std::sync::LazyLock;

use regex::Regex;

use crate::message::{StarterMessage, ThreadSnapshot};
use crate::metadata::{PostMetadata, find_metadata, is_metadata_embed};
use crate::version::{first_bracket_token, normalize_version, trailing_bracket_version};

/// Placeholder used when a version is not provided.
pub const UNSPECIFIED: &str = "Non spécifiée";

const TRANSLATOR_PLACEHOLDERS: &[&str] = &["(traducteur)", "(nom)", "", "n/a", "na", "aucun", "none"];
const TITLE_PLACEHOLDERS: &[&str] = &["(titre du jeu)", "(titre)", ""];

static TRANSLATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(?:\*\*[ \t]*)?Traducteur[ \t]*:[ \t]*(?:\*\*[ \t]*)?(.*?)[ \t]*$").unwrap()
});
static AVAILABLE_FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)TRADUCTION FR DISPONIBLE POUR\s*:\s*\*\*(.+?)\*\*").unwrap()
});
static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\*\*Titre du jeu[ \t]*:[ \t]*\*\*[ \t]*(.*?)[ \t]*$").unwrap());
static GAME_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)\*\*Version du jeu[ \t]*:[ \t]*\*\*[ \t]*(.+?)[ \t]*$").unwrap());
static TRANSLATION_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)\*\*Version (?:traduite|de la traduction)[ \t]*:[ \t]*\*\*[ \t]*(.+?)[ \t]*$").unwrap()
});
static GAME_VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^(.*?\*\*Version du jeu[ \t]*:[ \t]*\*\*[ \t]*).+?[ \t]*$").unwrap()
});
static GAME_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)(?:\*\*\s*)?(?:Lien du jeu(?:\s*\(VO\))?\s*:\s*(?:\*\*\s*)?|\[\s*Jeu original\s*\]\s*)\[?[^\]\n]*\]?\(\s*<?\s*(https?://[^\s>)]+)",
    )
    .unwrap()
});

/// Normalized description of a translation post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedInfo {
    pub title: String,
    pub translator: Option<String>,
    pub game_version: String,
    pub translation_version: String,
    pub is_integrated: bool,
    pub image_ref: Option<String>,
}

impl ExtractedInfo {
    /// All-defaults record for a thread.
    pub fn defaults(thread_name: &str) -> Self {
        Self {
            title: thread_name.to_string(),
            translator: None,
            game_version: UNSPECIFIED.to_string(),
            translation_version: UNSPECIFIED.to_string(),
            is_integrated: false,
            image_ref: None,
        }
    }
}

/// How extraction treats a metadata embed found on the starter message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataPolicy {
    /// Use metadata when present, text otherwise.
    Prefer,
    /// Always parse the text, even when metadata is present.
    Ignore,
}

/// Extract using the metadata embedded in the message itself.
pub fn extract(thread: &ThreadSnapshot, message: &StarterMessage, policy: MetadataPolicy) -> ExtractedInfo {
    let metadata = match policy {
        MetadataPolicy::Prefer => find_metadata(&message.embeds),
        MetadataPolicy::Ignore => None,
    };
    extract_with(thread, message, metadata.as_ref())
}

/// Extract with an explicitly supplied metadata payload.
pub fn extract_with(
    thread: &ThreadSnapshot,
    message: &StarterMessage,
    metadata: Option<&PostMetadata>,
) -> ExtractedInfo {
    let mut info = match metadata {
        Some(meta) => from_metadata(&thread.name, meta),
        None => from_text(&thread.name, &message.content),
    };
    info.image_ref = image_ref(message);
    info
}

fn from_metadata(thread_name: &str, meta: &PostMetadata) -> ExtractedInfo {
    let defaults = ExtractedInfo::defaults(thread_name);
    ExtractedInfo {
        title: non_empty(&meta.game_name).unwrap_or(defaults.title),
        translator: meta.translator().and_then(clean_translator),
        game_version: non_empty(&meta.game_version).unwrap_or(defaults.game_version),
        translation_version: non_empty(&meta.translate_version)
            .unwrap_or(defaults.translation_version),
        is_integrated: meta.is_integrated,
        image_ref: None,
    }
}

fn from_text(thread_name: &str, content: &str) -> ExtractedInfo {
    let translator = TRANSLATOR
        .captures(content)
        .and_then(|caps| clean_translator(&caps[1]));

    let title = AVAILABLE_FOR
        .captures(content)
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            TITLE_LINE
                .captures(content)
                .map(|caps| caps[1].trim().to_string())
                .filter(|t| !TITLE_PLACEHOLDERS.contains(&t.to_lowercase().as_str()))
        })
        .unwrap_or_else(|| thread_name.to_string());

    let game_version = capture_version(&GAME_VERSION, content)
        .or_else(|| first_bracket_token(thread_name))
        .unwrap_or_else(|| UNSPECIFIED.to_string());

    let translation_version =
        capture_version(&TRANSLATION_VERSION, content).unwrap_or_else(|| UNSPECIFIED.to_string());

    ExtractedInfo {
        title,
        translator,
        game_version,
        translation_version,
        is_integrated: false,
        image_ref: None,
    }
}

fn capture_version(re: &Regex, content: &str) -> Option<String> {
    re.captures(content)
        .map(|caps| normalize_version(&caps[1]))
        .filter(|v| !v.is_empty())
}

fn clean_translator(raw: &str) -> Option<String> {
    let name = raw.trim().trim_matches('*').trim();
    if TRANSLATOR_PLACEHOLDERS.contains(&name.to_lowercase().as_str()) {
        None
    } else {
        Some(name.to_string())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// First image attachment, else the first visible embed's image or thumbnail.
pub fn image_ref(message: &StarterMessage) -> Option<String> {
    if let Some(attachment) = message.attachments.iter().find(|a| a.is_image()) {
        return Some(attachment.url.clone());
    }
    message
        .embeds
        .iter()
        .filter(|embed| !is_metadata_embed(embed))
        .find_map(|embed| embed.image_url.clone().or_else(|| embed.thumbnail_url.clone()))
}

/// Game link (original game page) found in the starter message.
pub fn game_link(message: &StarterMessage) -> Option<String> {
    if let Some(link) = find_metadata(&message.embeds).and_then(|meta| meta.game_link) {
        return Some(link);
    }
    GAME_LINK
        .captures(&message.content)
        .map(|caps| caps[1].trim().to_string())
}

/// Game version a post currently advertises: metadata, then the
/// `Version du jeu` line, then the thread name's trailing bracket.
pub fn post_game_version(thread_name: &str, message: &StarterMessage) -> Option<String> {
    find_metadata(&message.embeds)
        .map(|meta| normalize_version(&meta.game_version))
        .filter(|v| !v.is_empty())
        .or_else(|| capture_version(&GAME_VERSION, &message.content))
        .or_else(|| trailing_bracket_version(thread_name).map(|v| normalize_version(&v)))
}

/// Rewrite the `Version du jeu` line of a post. Content without that line is
/// returned unchanged.
pub fn with_game_version(content: &str, new_version: &str) -> String {
    let replacement = format!("${{1}}`{}`", new_version.trim().replace('$', "$$"));
    GAME_VERSION_LINE
        .replace(content, replacement.as_str())
        .into_owned()
}
