use serenity::{
    all::{ChannelId, GuildId, VoiceState},
    cache::Cache,
};
use std::sync::Arc;

use crate::audio::{ListenerProbe, VoiceTarget};

/// Counts human listeners from the gateway cache.
///
/// The channel is the one the bot is in right now, which differs from the
/// session's target after someone drags the bot elsewhere.
pub struct CacheProbe {
    cache: Arc<Cache>,
}

impl CacheProbe {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }

    fn is_bot(&self, state: &VoiceState) -> bool {
        match &state.member {
            Some(member) => member.user.bot,
            None => self.cache.user(state.user_id).is_some_and(|user| user.bot),
        }
    }
}

impl ListenerProbe for CacheProbe {
    fn listeners(&self, target: VoiceTarget) -> Option<usize> {
        let me = self.cache.current_user().id;
        let guild = self.cache.guild(GuildId::new(target.guild_id))?;

        let bot_channel = guild.voice_states.get(&me).and_then(|state| state.channel_id);
        let channel_id = listening_channel(ChannelId::new(target.channel_id), bot_channel);
        if !guild.channels.contains_key(&channel_id) {
            return None;
        }

        let states = guild
            .voice_states
            .values()
            .map(|state| (state.channel_id, self.is_bot(state)));
        Some(count_listeners(states, channel_id))
    }
}

/// Where the bot actually is, falling back to the channel it was asked to join.
fn listening_channel(recorded: ChannelId, bot_channel: Option<ChannelId>) -> ChannelId {
    bot_channel.unwrap_or(recorded)
}

/// Non-bot members connected to `channel`.
fn count_listeners(
    states: impl Iterator<Item = (Option<ChannelId>, bool)>,
    channel: ChannelId,
) -> usize {
    states
        .filter(|(joined, is_bot)| *joined == Some(channel) && !is_bot)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bots_and_other_channels_are_not_listeners() {
        let music = ChannelId::new(20);
        let lounge = ChannelId::new(30);
        let states = vec![
            (Some(music), true),
            (Some(music), false),
            (Some(lounge), false),
            (None, false),
        ];

        assert_eq!(count_listeners(states.clone().into_iter(), music), 1);
        assert_eq!(count_listeners(states.into_iter(), lounge), 1);
    }

    #[test]
    fn test_moved_bot_counts_its_new_channel() {
        let recorded = ChannelId::new(20);
        let moved_to = ChannelId::new(30);
        // The bot itself plus two people, all in the channel it was dragged to.
        let states = vec![
            (Some(moved_to), true),
            (Some(moved_to), false),
            (Some(moved_to), false),
        ];

        let channel = listening_channel(recorded, Some(moved_to));
        assert_eq!(channel, moved_to);
        assert_eq!(count_listeners(states.into_iter(), channel), 2);
        assert_eq!(listening_channel(recorded, None), recorded);
    }
}
