use std::time::Duration;

use tracing::warn;
use tradbridge_core::Announcement;

use crate::channel::MessageChannel;

/// Alerts per message.
pub const ALERTS_PER_MESSAGE: usize = 10;
/// Discord message content limit.
const MAX_MESSAGE_CHARS: usize = 2000;
const MISSING_VERSION: &str = "Non renseignee";

/// A version mismatch between F95Zone and a forum post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionAlert {
    pub thread_id: u64,
    pub thread_name: String,
    pub thread_url: String,
    pub f95_version: String,
    pub post_version: Option<String>,
    /// Whether the post was rewritten with the new version.
    pub updated: bool,
}

impl VersionAlert {
    fn render(&self) -> String {
        let post_version = self.post_version.as_deref().unwrap_or(MISSING_VERSION);
        let updated = if self.updated { "OUI ✅" } else { "NON ❌" };
        format!(
            "**{}**\n├ Version F95 : `{}`\n├ Version du poste : `{post_version}`\n├ Version modifiee : {updated}\n└ Lien : {}\n",
            self.thread_name, self.f95_version, self.thread_url
        )
    }
}

/// Group alerts into messages of at most ten, each opened by the same header.
pub fn render_alert_messages(alerts: &[VersionAlert]) -> Vec<String> {
    if alerts.is_empty() {
        return Vec::new();
    }
    let header = format!("🚨 **Mises a jour detectees** ({} jeux)\n", alerts.len());

    let mut messages = Vec::new();
    let mut current = header.clone();
    let mut in_current = 0;
    for alert in alerts {
        let block = format!("\n{}", alert.render());
        let full = in_current == ALERTS_PER_MESSAGE
            || (in_current > 0 && current.chars().count() + block.chars().count() > MAX_MESSAGE_CHARS);
        if full {
            let done = std::mem::replace(&mut current, header.clone());
            messages.push(done.trim_end().to_string());
            in_current = 0;
        }
        current.push_str(&block);
        in_current += 1;
    }
    messages.push(current.trim_end().to_string());
    messages
}

/// Send the grouped alerts. Returns how many messages went out.
pub async fn send_alerts(channel: &dyn MessageChannel, alerts: &[VersionAlert], pause: Duration) -> usize {
    let mut sent = 0;
    for (index, message) in render_alert_messages(alerts).into_iter().enumerate() {
        if index > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        match channel.send(&Announcement::text(message)).await {
            Ok(_) => sent += 1,
            Err(err) => warn!("failed to send version alert: {err}"),
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::fakes::FakeChannel;

    fn alert(i: usize) -> VersionAlert {
        VersionAlert {
            thread_id: i as u64,
            thread_name: format!("Jeu {i}"),
            thread_url: format!("https://discord.com/channels/1/{i}"),
            f95_version: "v2".to_string(),
            post_version: Some("v1".to_string()),
            updated: true,
        }
    }

    #[test]
    fn renders_single_alert() {
        let mut missing = alert(1);
        missing.post_version = None;
        missing.updated = false;
        let messages = render_alert_messages(&[missing]);
        insta::assert_snapshot!(messages[0], @r"
        🚨 **Mises a jour detectees** (1 jeux)

        **Jeu 1**
        ├ Version F95 : `v2`
        ├ Version du poste : `Non renseignee`
        ├ Version modifiee : NON ❌
        └ Lien : https://discord.com/channels/1/1
        ");
    }

    #[test]
    fn groups_by_ten() {
        let alerts: Vec<_> = (0..23).map(alert).collect();
        let messages = render_alert_messages(&alerts);
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.starts_with("🚨 **Mises a jour detectees** (23 jeux)")));
        assert_eq!(messages[2].matches("└ Lien").count(), 3);
    }

    #[test]
    fn long_names_split_early() {
        let alerts: Vec<_> = (0..5)
            .map(|i| VersionAlert {
                thread_name: "x".repeat(700),
                ..alert(i)
            })
            .collect();
        let messages = render_alert_messages(&alerts);
        assert!(messages.len() > 1);
        assert!(messages.iter().all(|m| m.chars().count() <= MAX_MESSAGE_CHARS));
    }

    #[tokio::test]
    async fn sends_each_group() {
        let channel = FakeChannel::new(1);
        let alerts: Vec<_> = (0..11).map(alert).collect();
        assert_eq!(send_alerts(&channel, &alerts, Duration::ZERO).await, 2);
        assert_eq!(channel.sent_count(), 2);
    }
}
