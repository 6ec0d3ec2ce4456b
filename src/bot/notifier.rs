use dashmap::DashMap;
use serenity::{
    all::{ChannelId, CreateMessage},
    http::Http,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    audio::{Notifier, SessionKey, SessionNotice},
    storage::Language,
    ui::embeds,
};

/// Posts session notices to the text channel a guild last used a command in.
pub struct DiscordNotifier {
    http: Arc<Http>,
    channels: DashMap<u64, ChannelId>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channels: DashMap::new(),
        }
    }

    pub fn remember(&self, guild_id: u64, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }
}

impl Notifier for DiscordNotifier {
    fn notify(&self, key: SessionKey, language: Language, notice: SessionNotice) {
        let Some(channel_id) = self.channels.get(&key.0).map(|c| *c) else {
            debug!("No text channel known for guild {}, dropping {:?}", key, notice);
            return;
        };

        // Sending happens off the session loop.
        let http = self.http.clone();
        let message = CreateMessage::new().embed(embeds::notice_embed(language, &notice));
        tokio::spawn(async move {
            if let Err(e) = channel_id.send_message(&http, message).await {
                warn!("Error sending notice to channel {}: {:?}", channel_id, e);
            }
        });
    }
}
