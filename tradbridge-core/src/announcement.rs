//! Announcement message format.
//!
//! Announcements are plain text with French labels. Prior announcements are
//! the only memory the engine has, so the same module both renders the
//! current format and parses the versions back out of earlier messages,
//! including the legacy publisher layout (backtick-wrapped values, `Etat`).

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::ExtractedInfo;
use crate::tags::TagSet;
use crate::version::normalize_version;

/// Embed colour used for the cover image of an announcement.
pub const ANNOUNCEMENT_EMBED_COLOUR: u32 = 0x4A_DE_80;
/// Embed colour of a deletion notice.
pub const DELETION_EMBED_COLOUR: u32 = 0xFF_6B_6B;

const INTEGRATED_SUFFIX: &str = " (intégrée)";
const DELETION_FOOTER: &str = "Cette publication a été retirée définitivement";

static CURRENT_GAME_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\*\*Version du jeu\s*:\*\*[ \t]*([^`\s][^\n]*?)[ \t]*$").unwrap()
});
static CURRENT_TRANSLATION_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\*\*Version de la traduction\s*:\*\*[ \t]*([^`\s][^\n]*?)[ \t]*$").unwrap()
});
static LEGACY_GAME_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\*\*Version du jeu\s*:\*\*[ \t]*`([^`\n]*)`").unwrap());
static LEGACY_TRANSLATION_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\*\*Version de la traduction\s*:\*\*[ \t]*`([^`\n]*)`").unwrap()
});

/// Whether an announcement introduces a thread or replaces an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementKind {
    New,
    Update,
}

/// A rendered message ready to be sent to the announcement channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub content: String,
    pub image_url: Option<String>,
    pub colour: u32,
    pub footer: Option<String>,
}

impl Announcement {
    /// Plain text message without embed.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            image_url: None,
            colour: 0,
            footer: None,
        }
    }

    /// Whether the message needs an embed next to its text.
    pub fn has_embed(&self) -> bool {
        self.image_url.is_some() || self.footer.is_some()
    }
}

/// Versions recovered from a previously sent announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorVersions {
    pub game_version: Option<String>,
    pub translation_version: Option<String>,
}

/// Known layouts of announcement text, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementFormat {
    /// Bare values, `État` label, `(intégrée)` suffix on integrated translations.
    V2,
    /// Publisher layout with backtick-wrapped versions and an `Etat` label.
    LegacyPublisher,
}

impl AnnouncementFormat {
    pub const CURRENT: AnnouncementFormat = AnnouncementFormat::V2;
    const PARSE_ORDER: [AnnouncementFormat; 2] =
        [AnnouncementFormat::V2, AnnouncementFormat::LegacyPublisher];

    /// Render an announcement in the current format.
    pub fn render(
        kind: AnnouncementKind,
        info: &ExtractedInfo,
        tags: &TagSet,
        thread_link: &str,
    ) -> Announcement {
        let mut content = prefix(kind, info.translator.as_deref());
        content.push_str("\n\n");
        content.push_str(&details(info, tags, thread_link));

        Announcement {
            content,
            image_url: info
                .image_ref
                .as_deref()
                .map(str::trim)
                .filter(|url| url.starts_with("http"))
                .map(str::to_string),
            colour: ANNOUNCEMENT_EMBED_COLOUR,
            footer: None,
        }
    }

    /// Notice sent when a post is removed through the API.
    pub fn render_deletion(title: &str, reason: Option<&str>) -> Announcement {
        let title = Some(title.trim()).filter(|t| !t.is_empty()).unwrap_or("Publication");
        let mut content = format!("🗑️ **Suppression d'une publication**\n\n**Publication supprimée :** {title}");
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            content.push_str(&format!("\n**Raison :** {reason}"));
        }
        Announcement {
            content,
            image_url: None,
            colour: DELETION_EMBED_COLOUR,
            footer: Some(DELETION_FOOTER.to_string()),
        }
    }

    /// Everything after the headline. Two announcements with the same
    /// details describe the same state of a thread.
    pub fn details_of(content: &str) -> &str {
        content
            .split_once("\n\n")
            .map(|(_, rest)| rest)
            .unwrap_or(content)
            .trim()
    }

    /// Recover the versions of a prior announcement, trying each known
    /// layout in turn. Unrecognised text yields no versions.
    pub fn parse_prior(content: &str) -> PriorVersions {
        PriorVersions {
            game_version: Self::PARSE_ORDER
                .iter()
                .find_map(|format| format.game_version(content)),
            translation_version: Self::PARSE_ORDER
                .iter()
                .find_map(|format| format.translation_version(content)),
        }
    }

    fn game_version(self, content: &str) -> Option<String> {
        let re = match self {
            AnnouncementFormat::V2 => &CURRENT_GAME_VERSION,
            AnnouncementFormat::LegacyPublisher => &LEGACY_GAME_VERSION,
        };
        capture(re, content)
    }

    fn translation_version(self, content: &str) -> Option<String> {
        let re = match self {
            AnnouncementFormat::V2 => &CURRENT_TRANSLATION_VERSION,
            AnnouncementFormat::LegacyPublisher => &LEGACY_TRANSLATION_VERSION,
        };
        capture(re, content).map(|v| {
            v.strip_suffix(INTEGRATED_SUFFIX.trim_start())
                .map(|s| s.trim_end().to_string())
                .unwrap_or(v)
        })
    }
}

fn capture(re: &Regex, content: &str) -> Option<String> {
    re.captures(content)
        .map(|caps| normalize_version(&caps[1]))
        .filter(|v| !v.is_empty())
}

fn prefix(kind: AnnouncementKind, translator: Option<&str>) -> String {
    match (kind, translator) {
        (AnnouncementKind::Update, Some(t)) => format!("🔄 **Mise à jour d'une traduction de {t}**"),
        (AnnouncementKind::New, Some(t)) => {
            format!("🎮 **Publication d'une nouvelle traduction de {t}**")
        }
        (AnnouncementKind::Update, None) => "🔄 **Mise à jour d'une de mes traductions**".to_string(),
        (AnnouncementKind::New, None) => {
            "🎮 **Publication d'une de mes nouvelles traductions**".to_string()
        }
    }
}

fn details(info: &ExtractedInfo, tags: &TagSet, thread_link: &str) -> String {
    let mut lines = vec![format!("**Nom du jeu :** [{}]({thread_link})", info.title)];
    if let Some(translator) = &info.translator {
        lines.push(format!("**Traducteur :** {translator}"));
    }
    lines.push(format!("**Version du jeu :** {}", info.game_version));
    let integrated = if info.is_integrated { INTEGRATED_SUFFIX } else { "" };
    lines.push(format!(
        "**Version de la traduction :** {}{integrated}",
        info.translation_version
    ));
    lines.push(format!("**État :** {}", tags.joined()));
    lines.join("\n")
}
