use serde::{Deserialize, Serialize};

/// Opaque platform identifier (user, channel, guild or message).
pub type Snowflake = String;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Snowflake,
    /// Display tag, e.g. `name#1234`.
    pub tag: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "voice")]
    Voice,
    #[serde(rename = "category")]
    Category,
    #[serde(rename = "dm")]
    Direct,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Snowflake,
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn is_text(&self) -> bool {
        self.kind == ChannelKind::Text
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub member_count: u64,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl Guild {
    pub fn text_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.is_text())
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Prefers a text channel literally named "general", else the first text channel.
    pub fn default_channel(&self) -> Option<&Channel> {
        self.text_channels()
            .find(|c| c.name.eq_ignore_ascii_case("general"))
            .or_else(|| self.text_channels().next())
    }
}

/// Where an inbound message was posted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum MessageOrigin {
    Guild {
        guild_id: Snowflake,
        channel_id: Snowflake,
    },
    Direct {
        channel_id: Snowflake,
        recipient: User,
    },
}

impl MessageOrigin {
    pub fn channel_id(&self) -> &str {
        match self {
            MessageOrigin::Guild { channel_id, .. } => channel_id,
            MessageOrigin::Direct { channel_id, .. } => channel_id,
        }
    }
}

/// Moderation roles of the author within the message's guild.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberRoles {
    pub manage_messages: bool,
    pub manage_guild: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: Snowflake,
    pub origin: MessageOrigin,
    pub author: User,
    pub content: String,
    /// None outside guilds or when the member could not be resolved.
    #[serde(default)]
    pub roles: Option<MemberRoles>,
}

/// Events pushed by the transport into the controller, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Ready {
        user: User,
        token: String,
        guilds: Vec<Guild>,
        latency_ms: u64,
    },
    Message(InboundMessage),
    MessageUpdate(InboundMessage),
    GuildCreate(Guild),
    GuildDelete(Guild),
    Error(String),
}
