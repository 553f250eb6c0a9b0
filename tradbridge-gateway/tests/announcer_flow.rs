//! Drives the announcement engine through a thread's life using only the
//! public collaborator traits.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tradbridge_core::{
    Announcement, AnnouncementKind, ChannelMessage, MetadataPolicy, StarterMessage, Tag,
    ThreadSnapshot,
};
use tradbridge_gateway::announce::SuppressReason;
use tradbridge_gateway::channel::ThreadLabels;
use tradbridge_gateway::{
    Announcer, AnnouncerConfig, ChannelError, MessageChannel, Outcome, ThreadSource,
};

const BOT: u64 = 42;
const THREAD: u64 = 1_122_334_455;

#[derive(Default)]
struct Channel {
    messages: Mutex<Vec<ChannelMessage>>,
}

impl Channel {
    fn contents(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }
}

#[async_trait]
impl MessageChannel for Channel {
    async fn recent_messages(&self, limit: u8) -> Result<Vec<ChannelMessage>, ChannelError> {
        let messages = self.messages.lock().unwrap();
        Ok(messages.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn delete_message(&self, message_id: u64) -> Result<(), ChannelError> {
        self.messages.lock().unwrap().retain(|m| m.id != message_id);
        Ok(())
    }

    async fn send(&self, message: &Announcement) -> Result<u64, ChannelError> {
        let mut messages = self.messages.lock().unwrap();
        let id = 500 + messages.len() as u64 + 1;
        messages.push(ChannelMessage {
            id,
            author_id: BOT,
            content: message.content.clone(),
        });
        Ok(id)
    }
}

struct Forum {
    thread: Mutex<ThreadSnapshot>,
    starter: Mutex<StarterMessage>,
}

impl Forum {
    fn new(game_version: &str) -> Self {
        Self {
            thread: Mutex::new(ThreadSnapshot {
                id: THREAD,
                guild_id: 7,
                parent_id: Some(8),
                name: "Eternum [v0.6]".to_string(),
                tags: vec![Tag::new("Terminé")],
                created_at: None,
            }),
            starter: Mutex::new(starter(game_version)),
        }
    }

    fn set_version(&self, game_version: &str) {
        *self.starter.lock().unwrap() = starter(game_version);
    }

    fn snapshot(&self) -> ThreadSnapshot {
        self.thread.lock().unwrap().clone()
    }
}

fn starter(game_version: &str) -> StarterMessage {
    StarterMessage {
        id: THREAD,
        content: format!(
            "TRADUCTION FR DISPONIBLE POUR : **Eternum**\n\
             **Version du jeu :** {game_version}\n\
             **Version traduite :** {game_version}\n"
        ),
        ..StarterMessage::default()
    }
}

#[async_trait]
impl ThreadSource for Forum {
    async fn current_thread(&self, thread_id: u64) -> Result<Option<ThreadSnapshot>, ChannelError> {
        let thread = self.snapshot();
        Ok((thread.id == thread_id).then_some(thread))
    }

    async fn starter_message(&self, _thread_id: u64) -> Result<Option<StarterMessage>, ChannelError> {
        Ok(Some(self.starter.lock().unwrap().clone()))
    }

    async fn labels(&self, _thread: &ThreadSnapshot) -> Result<ThreadLabels, ChannelError> {
        Ok(ThreadLabels::default())
    }
}

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

#[tokio::test(start_paused = true)]
async fn thread_lifecycle_keeps_one_announcement() {
    let channel = Arc::new(Channel::default());
    let forum = Arc::new(Forum::new("v0.6"));
    let announcer = Announcer::new(channel.clone(), forum.clone(), BOT, config());

    // Creation: announced once the tags settled.
    let created = announcer.on_thread_created(THREAD).await.unwrap();
    assert!(matches!(created, Outcome::Published { kind: AnnouncementKind::New, .. }));
    assert_eq!(channel.contents().len(), 1);

    // An edit right after creation belongs to the creation burst.
    assert!(announcer.on_starter_edited(&forum.snapshot(), true).is_none());

    tokio::time::advance(Duration::from_secs(31)).await;

    // Version bump: the previous announcement is replaced.
    forum.set_version("v0.7");
    let handle = announcer.on_starter_edited(&forum.snapshot(), true).unwrap();
    let updated = handle.await.unwrap().unwrap();
    assert!(matches!(updated, Outcome::Published { kind: AnnouncementKind::Update, .. }));
    let contents = channel.contents();
    assert_eq!(contents.len(), 1);
    assert!(contents[0].contains("**Version du jeu :** v0.7"));
    assert!(contents[0].contains(&THREAD.to_string()));

    // Same state again: nothing new goes out.
    let handle = announcer.on_starter_edited(&forum.snapshot(), true).unwrap();
    let repeated = handle.await.unwrap().unwrap();
    assert_eq!(repeated, Outcome::Suppressed(SuppressReason::AlreadyPublished));
    assert_eq!(channel.contents().len(), 1);
}
