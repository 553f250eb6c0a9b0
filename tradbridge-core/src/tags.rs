//! Forum tag rendering.
//!
//! Tags are compared by their rendered `"emoji name"` form, never by id, so
//! that a tag recreated on the forum with the same label still matches.

use serde::{Deserialize, Serialize};

/// Emoji attached to a forum tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagEmoji {
    /// Unicode glyph, rendered as-is.
    Unicode(String),
    /// Custom guild emoji, rendered with Discord's `<:name:id>` syntax.
    Custom { id: u64, name: Option<String> },
}

impl TagEmoji {
    pub fn render(&self) -> String {
        match self {
            TagEmoji::Unicode(glyph) => glyph.clone(),
            TagEmoji::Custom { id, name } => {
                format!("<:{}:{}>", name.as_deref().unwrap_or("tag"), id)
            }
        }
    }
}

/// A forum tag as applied to a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<TagEmoji>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emoji: None,
        }
    }

    pub fn with_emoji(name: impl Into<String>, glyph: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emoji: Some(TagEmoji::Unicode(glyph.into())),
        }
    }

    /// `"<emoji> <name>"` when an emoji is set, the bare name otherwise.
    pub fn render(&self) -> String {
        match &self.emoji {
            Some(emoji) => format!("{} {}", emoji.render(), self.name),
            None => self.name.clone(),
        }
    }
}

/// Sorted rendering of the tags applied to a thread at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagSet(Vec<String>);

impl TagSet {
    /// Render and sort. Input order never affects the result.
    pub fn normalize(tags: &[Tag]) -> Self {
        let mut rendered: Vec<String> = tags.iter().map(Tag::render).collect();
        rendered.sort();
        Self(rendered)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Tags present in `self` but not in `before`.
    pub fn added_since(&self, before: &TagSet) -> Vec<&str> {
        self.iter()
            .filter(|tag| !before.0.iter().any(|b| b == tag))
            .collect()
    }

    /// Comma-joined status line used in announcements.
    pub fn joined(&self) -> String {
        self.0.join(", ")
    }
}

/// Whether any tag is named exactly "MAJ" or "Mise à jour", ignoring case
/// and surrounding whitespace.
pub fn has_update_tag(tags: &[Tag]) -> bool {
    tags.iter().any(|tag| {
        let name = tag.name.trim().to_lowercase();
        name == "maj" || name == "mise à jour"
    })
}
