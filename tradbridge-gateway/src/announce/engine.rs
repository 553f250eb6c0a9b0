//! Event entry points and the "scan, decide, send" pipeline.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tradbridge_core::{
    AnnouncementFormat, AnnouncementKind, AnnouncerSettings, MetadataPolicy, TagSet,
    ThreadSnapshot, extract,
};

use super::coordinator::{CreationGuard, PendingTicket, ThreadCoordinator};
use super::decision::{Decision, decide};
use super::history;
use super::{AnnounceError, EventSource, Outcome};
use crate::channel::{MessageChannel, ThreadSource};

/// Engine tuning, resolved from `[announcer]` settings.
#[derive(Debug, Clone)]
pub struct AnnouncerConfig {
    pub delay: Duration,
    /// Upper bound of the random delay added on top of `delay`.
    pub max_jitter: Duration,
    pub settle: Duration,
    pub recent_creation_window: Duration,
    pub history_limit: u8,
    pub metadata: MetadataPolicy,
}

impl From<&AnnouncerSettings> for AnnouncerConfig {
    fn from(settings: &AnnouncerSettings) -> Self {
        Self {
            delay: settings.delay(),
            max_jitter: Duration::from_millis(settings.jitter_ms),
            settle: settings.settle(),
            recent_creation_window: settings.recent_creation_window(),
            history_limit: settings.history_limit,
            metadata: if settings.prefer_metadata {
                MetadataPolicy::Prefer
            } else {
                MetadataPolicy::Ignore
            },
        }
    }
}

/// Turns forum thread events into at most one announcement per change.
///
/// Cheap to clone; clones share the same per-thread bookkeeping.
#[derive(Clone)]
pub struct Announcer {
    channel: Arc<dyn MessageChannel>,
    threads: Arc<dyn ThreadSource>,
    coordinator: Arc<ThreadCoordinator>,
    self_id: u64,
    config: AnnouncerConfig,
}

impl Announcer {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        threads: Arc<dyn ThreadSource>,
        self_id: u64,
        config: AnnouncerConfig,
    ) -> Self {
        Self {
            channel,
            threads,
            coordinator: Arc::new(ThreadCoordinator::new(config.recent_creation_window)),
            self_id,
            config,
        }
    }

    pub fn coordinator(&self) -> &ThreadCoordinator {
        &self.coordinator
    }

    /// A thread was just created. Announces right away (after the settle
    /// delay) when the thread carries tags by then.
    pub async fn on_thread_created(&self, thread_id: u64) -> Result<Outcome, AnnounceError> {
        self.coordinator.mark_created(thread_id);
        self.forget_creation_later(thread_id);
        tokio::time::sleep(self.config.settle).await;

        let Some(thread) = self.current_thread(thread_id, EventSource::Created).await else {
            return Ok(Outcome::Skipped);
        };
        if thread.tags.is_empty() {
            debug!(thread_id, "new thread has no tags yet");
            return Ok(Outcome::Suppressed(super::SuppressReason::NoTags));
        }

        self.run_pipeline(thread_id, EventSource::Created).await
    }

    /// Tags of a thread changed. Schedules an announcement when tags were
    /// added. `before` is `None` when the previous state is unknown.
    pub fn on_thread_updated(
        &self,
        before: Option<&TagSet>,
        after: &ThreadSnapshot,
    ) -> Option<JoinHandle<Result<Outcome, AnnounceError>>> {
        if self.inside_creation_window(after.id, EventSource::TagsUpdated) {
            return None;
        }

        let tags = after.tag_set();
        if tags.is_empty() {
            return None;
        }
        if let Some(before) = before
            && tags.added_since(before).is_empty()
        {
            debug!(thread_id = after.id, "no tag added, nothing to announce");
            return None;
        }

        Some(self.schedule(after.id, tags, EventSource::TagsUpdated))
    }

    /// The starter message of a thread was edited.
    pub fn on_starter_edited(
        &self,
        thread: &ThreadSnapshot,
        content_changed: bool,
    ) -> Option<JoinHandle<Result<Outcome, AnnounceError>>> {
        if !content_changed {
            return None;
        }
        if self.inside_creation_window(thread.id, EventSource::StarterEdited) {
            return None;
        }

        let tags = thread.tag_set();
        if tags.is_empty() {
            return None;
        }
        Some(self.schedule(thread.id, tags, EventSource::StarterEdited))
    }

    fn inside_creation_window(&self, thread_id: u64, source: EventSource) -> bool {
        match self.coordinator.creation_guard(thread_id) {
            CreationGuard::Recent { elapsed } => {
                debug!(
                    thread_id,
                    %source,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "ignoring event on freshly created thread"
                );
                true
            }
            CreationGuard::Clear => false,
        }
    }

    /// Debounce: replace any pending announcement of the thread with a new
    /// one firing after the configured delay.
    pub fn schedule(
        &self,
        thread_id: u64,
        tags: TagSet,
        source: EventSource,
    ) -> JoinHandle<Result<Outcome, AnnounceError>> {
        let ticket = self.coordinator.schedule(thread_id, tags);
        if ticket.superseded {
            debug!(thread_id, %source, "superseded pending announcement");
        }

        let this = self.clone();
        tokio::spawn(async move {
            let generation = ticket.generation;
            let result = this.run_scheduled(thread_id, ticket, source).await;
            this.coordinator.finish(thread_id, generation);
            if let Err(err) = &result {
                error!(thread_id, %source, "announcement failed: {err}");
            }
            result
        })
    }

    async fn run_scheduled(
        &self,
        thread_id: u64,
        ticket: PendingTicket,
        source: EventSource,
    ) -> Result<Outcome, AnnounceError> {
        let mut cancelled = ticket.cancelled;
        let wait = self.config.delay + self.jitter();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancelled.wait_for(|c| *c) => {
                debug!(thread_id, %source, "pending announcement cancelled");
                return Ok(Outcome::Cancelled);
            }
        }

        let Some(thread) = self.current_thread(thread_id, source).await else {
            return Ok(Outcome::Skipped);
        };
        if thread.tags.is_empty() {
            info!(thread_id, %source, "tags removed before the announcement fired");
            return Ok(Outcome::Suppressed(super::SuppressReason::NoTags));
        }

        let lock = self.coordinator.lock_for(thread_id);
        let _guard = lock.lock().await;
        if *cancelled.borrow() {
            debug!(thread_id, %source, "pending announcement cancelled while waiting for lock");
            return Ok(Outcome::Cancelled);
        }

        self.run_locked(thread_id, source).await
    }

    /// Evict the creation marker once the window is over, even when no
    /// later event for the thread ever arrives.
    fn forget_creation_later(&self, thread_id: u64) {
        let coordinator = Arc::clone(&self.coordinator);
        let window = self.config.recent_creation_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            coordinator.release(thread_id);
        });
    }

    fn jitter(&self) -> Duration {
        let max = self.config.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max))
    }

    /// Scan, decide and send under the thread's lock.
    pub async fn run_pipeline(
        &self,
        thread_id: u64,
        source: EventSource,
    ) -> Result<Outcome, AnnounceError> {
        let lock = self.coordinator.lock_for(thread_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.run_locked(thread_id, source).await
        };
        drop(lock);
        self.coordinator.release(thread_id);
        outcome
    }

    async fn current_thread(&self, thread_id: u64, source: EventSource) -> Option<ThreadSnapshot> {
        match self.threads.current_thread(thread_id).await {
            Ok(Some(thread)) => Some(thread),
            Ok(None) => {
                info!(thread_id, %source, "thread no longer exists");
                None
            }
            Err(err) => {
                warn!(thread_id, %source, "failed to read thread: {err}");
                None
            }
        }
    }

    async fn run_locked(
        &self,
        thread_id: u64,
        source: EventSource,
    ) -> Result<Outcome, AnnounceError> {
        let Some(thread) = self.current_thread(thread_id, source).await else {
            return Ok(Outcome::Skipped);
        };
        let starter = match self.threads.starter_message(thread_id).await {
            Ok(Some(starter)) => starter,
            Ok(None) => {
                info!(thread_id, %source, "starter message missing, skipping");
                return Ok(Outcome::Skipped);
            }
            Err(err) => {
                warn!(thread_id, %source, "failed to read starter message: {err}");
                return Ok(Outcome::Skipped);
            }
        };

        let tags = thread.tag_set();
        let info = extract(&thread, &starter, self.config.metadata);
        let link = thread.link();
        let fresh = AnnouncementFormat::render(AnnouncementKind::New, &info, &tags, &link);

        let history = history::scan(
            self.channel.as_ref(),
            self.self_id,
            thread_id,
            self.config.history_limit,
            AnnouncementFormat::details_of(&fresh.content),
        )
        .await;

        let (kind, announcement) = match decide(&tags, &info, &history) {
            Decision::Suppress(reason) => {
                info!(thread_id, %source, ?reason, "announcement suppressed");
                return Ok(Outcome::Suppressed(reason));
            }
            Decision::PublishUpdate { replace } => {
                if let Some(message_id) = replace
                    && let Err(err) = self.channel.delete_message(message_id).await
                {
                    warn!(thread_id, message_id, "failed to delete outdated announcement: {err}");
                }
                let update =
                    AnnouncementFormat::render(AnnouncementKind::Update, &info, &tags, &link);
                (AnnouncementKind::Update, update)
            }
            Decision::PublishNew => (AnnouncementKind::New, fresh),
        };

        let message_id = self
            .channel
            .send(&announcement)
            .await
            .map_err(|source| AnnounceError::Send { thread_id, source })?;

        info!(thread_id, %source, message_id, ?kind, title = %info.title, "announcement sent");
        Ok(Outcome::Published { kind, message_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::SuppressReason;
    use crate::channel::fakes::{FakeChannel, FakeThreads};
    use tradbridge_core::{Tag, UNSPECIFIED};

    const BOT: u64 = 1;
    const THREAD: u64 = 987_654_321;

    fn config() -> AnnouncerConfig {
        AnnouncerConfig {
            delay: Duration::from_secs(5),
            max_jitter: Duration::ZERO,
            settle: Duration::from_secs(2),
            recent_creation_window: Duration::from_secs(30),
            history_limit: 50,
            metadata: MetadataPolicy::Prefer,
        }
    }

    fn thread(tags: &[&str]) -> ThreadSnapshot {
        ThreadSnapshot {
            id: THREAD,
            guild_id: 10,
            parent_id: Some(20),
            name: "Growing Problems [v0.10]".to_string(),
            tags: tags.iter().map(|t| Tag::new(*t)).collect(),
            created_at: None,
        }
    }

    fn post(game: &str, translation: &str) -> String {
        format!(
            "TRADUCTION FR DISPONIBLE POUR : **Growing Problems**\n\
             **Version du jeu :** {game}\n\
             **Version traduite :** {translation}\n"
        )
    }

    struct Harness {
        channel: Arc<FakeChannel>,
        threads: Arc<FakeThreads>,
        announcer: Announcer,
    }

    fn harness_with(channel: FakeChannel) -> Harness {
        let channel = Arc::new(channel);
        let threads = Arc::new(FakeThreads::default());
        threads.put(thread(&["Terminé"]), &post("v1", "v1"));
        let announcer = Announcer::new(channel.clone(), threads.clone(), BOT, config());
        Harness {
            channel,
            threads,
            announcer,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeChannel::new(BOT))
    }

    /// An announcement for THREAD as the bot would have sent it.
    fn sent_before(game: &str, translation: &str) -> String {
        let mut info = tradbridge_core::ExtractedInfo::defaults("Growing Problems");
        info.game_version = game.to_string();
        info.translation_version = translation.to_string();
        AnnouncementFormat::render(
            AnnouncementKind::New,
            &info,
            &thread(&["Terminé"]).tag_set(),
            &thread(&[]).link(),
        )
        .content
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_sends_once_with_latest_tags() {
        let h = harness();
        let mut handles = Vec::new();

        for tags in [["En cours"], ["Terminé"], ["Abandonné"]] {
            h.threads.set_tags(THREAD, vec![Tag::new(tags[0])]);
            let snapshot = thread(&tags);
            handles.push(h.announcer.on_starter_edited(&snapshot, true).unwrap());
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(outcomes[0], Outcome::Cancelled);
        assert_eq!(outcomes[1], Outcome::Cancelled);
        assert!(matches!(outcomes[2], Outcome::Published { kind: AnnouncementKind::New, .. }));
        assert_eq!(h.channel.sent_count(), 1);
        assert!(h.channel.contents()[0].contains("**État :** Abandonné"));
        assert_eq!(h.announcer.coordinator().tracked(), 0);
    }

    #[tokio::test]
    async fn republish_with_same_versions_is_suppressed() {
        let h = harness();
        h.channel.push(BOT, &sent_before("v1", "v1"));
        h.channel.push(55, "bravo !");

        let outcome = h.announcer.run_pipeline(THREAD, EventSource::StarterEdited).await.unwrap();
        assert_eq!(outcome, Outcome::Suppressed(SuppressReason::AlreadyPublished));
        assert_eq!(h.channel.sent_count(), 0);
        assert!(h.channel.deleted_ids().is_empty());
    }

    #[tokio::test]
    async fn version_change_replaces_prior_announcement() {
        let h = harness();
        let prior = h.channel.push(BOT, &sent_before("v1", "v1"));
        h.channel.push(55, "bravo !");
        h.threads.set_content(THREAD, &post("v2", "v2"));

        let outcome = h.announcer.run_pipeline(THREAD, EventSource::StarterEdited).await.unwrap();
        assert!(matches!(outcome, Outcome::Published { kind: AnnouncementKind::Update, .. }));
        assert_eq!(h.channel.deleted_ids(), vec![prior]);

        let contents = h.channel.contents();
        assert_eq!(contents.len(), 2);
        assert!(contents[1].starts_with("🔄"));
        assert!(contents[1].contains("**Version du jeu :** v2"));
    }

    #[tokio::test]
    async fn latest_announcement_is_replaced_in_place() {
        let h = harness();
        h.channel.push(BOT, &sent_before("v1", "v0"));
        h.threads.set_content(THREAD, &post("v1", "v1"));

        let outcome = h.announcer.run_pipeline(THREAD, EventSource::StarterEdited).await.unwrap();
        assert!(matches!(outcome, Outcome::Published { kind: AnnouncementKind::Update, .. }));
        assert_eq!(h.channel.deleted_ids().len(), 1);
        assert_eq!(h.channel.contents().len(), 1);
    }

    #[tokio::test]
    async fn untagged_thread_never_announces() {
        let h = harness();
        h.threads.set_tags(THREAD, Vec::new());

        let outcome = h.announcer.run_pipeline(THREAD, EventSource::StarterEdited).await.unwrap();
        assert_eq!(outcome, Outcome::Suppressed(SuppressReason::NoTags));
        assert!(h.announcer.on_starter_edited(&thread(&[]), true).is_none());
        assert!(h.announcer.on_thread_updated(None, &thread(&[])).is_none());
        assert_eq!(h.channel.sent_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tags_removed_while_pending_cancel_the_announcement() {
        let h = harness();
        let handle = h.announcer.on_starter_edited(&thread(&["Terminé"]), true).unwrap();
        h.threads.set_tags(THREAD, Vec::new());

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, Outcome::Suppressed(SuppressReason::NoTags));
        assert_eq!(h.channel.sent_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn events_inside_creation_window_are_dropped() {
        let h = harness();
        h.announcer.coordinator().mark_created(THREAD);

        tokio::time::advance(Duration::from_secs(10)).await;
        let after = thread(&["Terminé", "MAJ"]);
        let before = thread(&["Terminé"]).tag_set();
        assert!(h.announcer.on_thread_updated(Some(&before), &after).is_none());
        assert!(h.announcer.on_starter_edited(&after, true).is_none());

        tokio::time::advance(Duration::from_secs(21)).await;
        let handle = h.announcer.on_thread_updated(Some(&before), &after).unwrap();
        assert!(matches!(handle.await.unwrap().unwrap(), Outcome::Published { .. }));
    }

    #[tokio::test]
    async fn tag_removal_alone_is_ignored() {
        let h = harness();
        let before = thread(&["Terminé", "MAJ"]).tag_set();
        assert!(h.announcer.on_thread_updated(Some(&before), &thread(&["Terminé"])).is_none());
    }

    #[tokio::test]
    async fn unchanged_edit_is_ignored() {
        let h = harness();
        assert!(h.announcer.on_starter_edited(&thread(&["Terminé"]), false).is_none());
    }

    #[tokio::test]
    async fn concurrent_runs_send_once() {
        let h = harness();
        let (a, b) = tokio::join!(
            h.announcer.run_pipeline(THREAD, EventSource::StarterEdited),
            h.announcer.run_pipeline(THREAD, EventSource::TagsUpdated),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let published = outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Published { .. }))
            .count();
        assert_eq!(published, 1);
        assert!(outcomes.contains(&Outcome::Suppressed(SuppressReason::AlreadyPublished)));
        assert_eq!(h.channel.sent_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn created_thread_is_forgotten_after_the_window() {
        let h = harness();
        let outcome = h.announcer.on_thread_created(THREAD).await.unwrap();
        assert!(matches!(outcome, Outcome::Published { .. }));
        assert_eq!(h.announcer.coordinator().tracked(), 1);

        tokio::time::advance(Duration::from_secs(3600)).await;
        tokio::task::yield_now().await;
        assert_eq!(h.announcer.coordinator().tracked(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn creation_announces_after_settle() {
        let h = harness();
        let outcome = h.announcer.on_thread_created(THREAD).await.unwrap();
        assert!(matches!(outcome, Outcome::Published { kind: AnnouncementKind::New, .. }));
        assert!(h.channel.contents()[0].contains(&THREAD.to_string()));
    }

    #[tokio::test]
    async fn missing_starter_is_skipped() {
        let h = harness();
        h.threads.remove_starter(THREAD);
        let outcome = h.announcer.run_pipeline(THREAD, EventSource::StarterEdited).await.unwrap();
        assert_eq!(outcome, Outcome::Skipped);
    }

    #[tokio::test]
    async fn send_failure_is_reported() {
        let mut channel = FakeChannel::new(BOT);
        channel.fail_sends = true;
        let h = harness_with(channel);

        let err = h
            .announcer
            .run_pipeline(THREAD, EventSource::StarterEdited)
            .await
            .unwrap_err();
        assert!(matches!(err, AnnounceError::Send { thread_id: THREAD, .. }));
    }

    #[tokio::test]
    async fn blank_post_announces_placeholders() {
        let h = harness();
        h.threads.set_content(THREAD, "");
        h.announcer.run_pipeline(THREAD, EventSource::StarterEdited).await.unwrap();
        let content = &h.channel.contents()[0];
        assert!(content.contains("**Version du jeu :** v0.10"));
        assert!(content.contains(&format!("**Version de la traduction :** {UNSPECIFIED}")));
    }
}
