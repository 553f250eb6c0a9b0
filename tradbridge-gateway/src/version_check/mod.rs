//! Scheduled comparison of forum post versions against F95Zone.
//!
//! Every run maps the forum's threads to F95Zone thread ids, asks
//! `checker.php` for the current versions, rewrites outdated posts and
//! reports each new mismatch once.

mod alerts;
mod client;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use tradbridge_core::metadata::find_metadata;
use tradbridge_core::version::{f95_thread_id, is_f95_link, normalize_version, thread_title_with_version};
use tradbridge_core::{StarterMessage, ThreadSnapshot, game_link, post_game_version, with_game_version};
use tradbridge_db::{BridgeDbPool, VersionNotificationRepository};

use crate::channel::{ChannelError, ForumPosts, MessageChannel, PostEdit, ThreadSource};

pub use alerts::{ALERTS_PER_MESSAGE, VersionAlert, render_alert_messages, send_alerts};
pub use client::{CheckerClient, CheckerError};

#[derive(Debug, thiserror::Error)]
pub enum VersionCheckError {
    #[error("Failed to list forum threads: {0}")]
    Forum(#[from] ChannelError),
    #[error("Database error: {0}")]
    Db(#[from] tradbridge_db::DbError),
}

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub threads: usize,
    pub tracked: usize,
    pub alerts: Vec<VersionAlert>,
}

/// A forum post linked to an F95Zone thread.
struct TrackedPost {
    f95_id: String,
    thread: ThreadSnapshot,
    starter: StarterMessage,
    version: String,
}

pub struct VersionChecker {
    forum: Arc<dyn ForumPosts>,
    threads: Arc<dyn ThreadSource>,
    notifications: Option<Arc<dyn MessageChannel>>,
    db: BridgeDbPool,
    client: CheckerClient,
    forum_id: u64,
    retention_days: i64,
    alert_pause: Duration,
}

impl VersionChecker {
    pub fn new(
        forum: Arc<dyn ForumPosts>,
        threads: Arc<dyn ThreadSource>,
        notifications: Option<Arc<dyn MessageChannel>>,
        db: BridgeDbPool,
        client: CheckerClient,
        forum_id: u64,
        retention_days: i64,
    ) -> Self {
        Self {
            forum,
            threads,
            notifications,
            db,
            client,
            forum_id,
            retention_days,
            alert_pause: Duration::from_millis(1500),
        }
    }

    pub fn with_alert_pause(mut self, pause: Duration) -> Self {
        self.alert_pause = pause;
        self
    }

    /// One full check of the forum.
    pub async fn run_once(&self) -> Result<CheckReport, VersionCheckError> {
        info!(forum_id = self.forum_id, "version check started");

        let pruned =
            VersionNotificationRepository::prune_older_than(self.db.pool(), self.retention_days)
                .await?;
        if pruned > 0 {
            info!("version check: pruned {pruned} old notification(s)");
        }

        let threads = self.forum.list_threads(self.forum_id).await?;
        let mut report = CheckReport {
            threads: threads.len(),
            ..CheckReport::default()
        };

        let tracked = self.collect_tracked(threads).await;
        report.tracked = tracked.len();
        if tracked.is_empty() {
            info!("version check: no thread links to F95Zone");
            return Ok(report);
        }

        let ids: Vec<String> = tracked.iter().map(|post| post.f95_id.clone()).collect();
        let versions = self.client.fetch_versions(&ids).await;
        if versions.is_empty() {
            warn!("version check: checker returned no versions");
            return Ok(report);
        }

        for post in &tracked {
            let Some(remote) = versions.get(&post.f95_id) else {
                warn!(
                    thread_id = post.thread.id,
                    f95_id = %post.f95_id,
                    "checker returned no version"
                );
                continue;
            };
            let remote = normalize_version(remote);
            if remote == post.version {
                debug!(thread_id = post.thread.id, version = %remote, "version up to date");
                continue;
            }
            if VersionNotificationRepository::is_notified(self.db.pool(), post.thread.id, &remote)
                .await?
            {
                continue;
            }

            info!(
                thread_id = post.thread.id,
                f95 = %remote,
                post = %post.version,
                "version mismatch detected"
            );
            let updated = self.update_post(post, &remote).await;
            report.alerts.push(VersionAlert {
                thread_id: post.thread.id,
                thread_name: post.thread.name.clone(),
                thread_url: post.thread.link(),
                f95_version: remote.clone(),
                post_version: Some(post.version.clone()),
                updated,
            });
            VersionNotificationRepository::mark_notified(self.db.pool(), post.thread.id, &remote)
                .await?;
        }

        match &self.notifications {
            Some(channel) => {
                send_alerts(channel.as_ref(), &report.alerts, self.alert_pause).await;
            }
            None if !report.alerts.is_empty() => {
                warn!("version check: no notification channel configured, alerts dropped");
            }
            None => {}
        }

        info!(alerts = report.alerts.len(), "version check finished");
        Ok(report)
    }

    async fn collect_tracked(&self, threads: Vec<ThreadSnapshot>) -> Vec<TrackedPost> {
        let mut tracked = Vec::new();
        for thread in threads {
            let starter = match self.threads.starter_message(thread.id).await {
                Ok(Some(starter)) => starter,
                Ok(None) => continue,
                Err(err) => {
                    warn!(thread_id = thread.id, "failed to read starter message: {err}");
                    continue;
                }
            };

            let (Some(link), Some(version)) = (
                game_link(&starter),
                post_game_version(&thread.name, &starter),
            ) else {
                debug!(thread_id = thread.id, "no game link or version, skipped");
                continue;
            };
            if !is_f95_link(&link) {
                debug!(thread_id = thread.id, "not an F95Zone link, skipped");
                continue;
            }
            let Some(f95_id) = f95_thread_id(&link) else {
                warn!(thread_id = thread.id, link = %link, "no F95Zone thread id in link");
                continue;
            };

            tracked.push(TrackedPost {
                f95_id,
                thread,
                starter,
                version,
            });
        }
        tracked
    }

    /// Rewrite title, version line and metadata of an outdated post.
    async fn update_post(&self, post: &TrackedPost, version: &str) -> bool {
        let title = thread_title_with_version(&post.thread.name, version);
        let content = with_game_version(&post.starter.content, version);
        let metadata = find_metadata(&post.starter.embeds).map(|mut meta| {
            meta.game_version = version.to_string();
            meta
        });

        let edit = PostEdit {
            title: (title != post.thread.name).then_some(title),
            content: (content != post.starter.content).then_some(content),
            tags: None,
            metadata,
        };
        if edit.is_empty() {
            return false;
        }

        match self.forum.edit_post(post.thread.id, &edit).await {
            Ok(()) => true,
            Err(err) => {
                warn!(thread_id = post.thread.id, "failed to update post version: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::fakes::{FakeChannel, FakeForum, FakeThreads};
    use httpmock::prelude::*;
    use serde_json::json;
    use tradbridge_db::test_helpers::create_test_pool;

    const FORUM: u64 = 20;

    fn thread(id: u64, name: &str) -> ThreadSnapshot {
        ThreadSnapshot {
            id,
            guild_id: 1,
            parent_id: Some(FORUM),
            name: name.to_string(),
            tags: Vec::new(),
            created_at: None,
        }
    }

    fn post(f95_url: &str, version: &str) -> String {
        format!("**Version du jeu :** `{version}`\n**Lien du jeu (VO) :** [F95]({f95_url})\n")
    }

    struct Fixture {
        forum: Arc<FakeForum>,
        alerts: Arc<FakeChannel>,
        checker: VersionChecker,
    }

    async fn fixture(server: &MockServer) -> Fixture {
        let forum = Arc::new(FakeForum::default());
        let threads = Arc::new(FakeThreads::default());
        let alerts = Arc::new(FakeChannel::new(1));

        let entries = [
            (1, "Eternum [v0.6]", post("https://f95zone.to/threads/eternum.12345/", "v0.6")),
            (2, "Summer [v1.0]", post("https://f95zone.to/threads/summer.777/", "v1.0")),
            (3, "Lewd [v2]", post("https://lewdcorner.com/threads/lewd.5/", "v2")),
            (4, "Sans lien [v1]", "rien".to_string()),
        ];
        for (id, name, content) in entries {
            let snapshot = thread(id, name);
            forum.threads.lock().unwrap().push(snapshot.clone());
            threads.put(snapshot, &content);
        }

        let db = create_test_pool().await.unwrap();
        let client = CheckerClient::new(server.url("/checker.php"), 50)
            .unwrap()
            .with_chunk_pause(Duration::ZERO);
        let checker = VersionChecker::new(
            forum.clone(),
            threads,
            Some(alerts.clone()),
            db,
            client,
            FORUM,
            30,
        )
        .with_alert_pause(Duration::ZERO);

        Fixture {
            forum,
            alerts,
            checker,
        }
    }

    #[tokio::test]
    async fn updates_outdated_posts_and_alerts_once() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/checker.php")
                    .query_param("threads", "12345,777");
                then.status(200)
                    .json_body(json!({"status": "ok", "msg": {"12345": "v0.7", "777": "v1.0"}}));
            })
            .await;
        let f = fixture(&server).await;

        let report = f.checker.run_once().await.unwrap();
        mock.assert_async().await;
        assert_eq!(report.threads, 4);
        assert_eq!(report.tracked, 2);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].thread_id, 1);
        assert!(report.alerts[0].updated);

        let edits = f.forum.edits.lock().unwrap().clone();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].1.title.as_deref(), Some("Eternum [v0.7]"));
        assert!(edits[0].1.content.as_deref().unwrap().contains("`v0.7`"));
        assert_eq!(f.alerts.sent_count(), 1);

        // Same mismatch on the next run is not reported again.
        let again = f.checker.run_once().await.unwrap();
        assert!(again.alerts.is_empty());
        assert_eq!(f.alerts.sent_count(), 1);
    }

    #[tokio::test]
    async fn failed_edit_is_still_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/checker.php");
                then.status(200)
                    .json_body(json!({"status": "ok", "msg": {"12345": "v0.7"}}));
            })
            .await;
        let mut f = fixture(&server).await;
        let threads = f.forum.threads.lock().unwrap().clone();
        f.forum = Arc::new(FakeForum {
            fail_edits: true,
            threads: std::sync::Mutex::new(threads),
            ..FakeForum::default()
        });
        f.checker.forum = f.forum.clone();

        let report = f.checker.run_once().await.unwrap();
        assert_eq!(report.alerts.len(), 1);
        assert!(!report.alerts[0].updated);
    }

    #[tokio::test]
    async fn empty_checker_answer_sends_nothing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/checker.php");
                then.status(500);
            })
            .await;
        let f = fixture(&server).await;

        let report = f.checker.run_once().await.unwrap();
        assert!(report.alerts.is_empty());
        assert_eq!(f.alerts.sent_count(), 0);
    }
}
