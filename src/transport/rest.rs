//! HTTP REST transport.
//!
//! Talks to a Discord-compatible v10 REST API. Inbound traffic is obtained by
//! polling channels with `?after=<last id>`; the first poll of a channel only
//! records the newest id so history is not replayed.
//!
//! Each poll cycle refreshes the DM channel list, then polls every DM channel,
//! the watched channel and, while `follow_all` is on, every guild text
//! channel. Cursors of channels that drop out of that set are forgotten.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use crate::transport::{
    Channel, ChannelKind, Guild, InboundMessage, MemberRoles, MessageOrigin, Snowflake, Transport,
    TransportError, TransportEvent, User,
};

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

const ADMINISTRATOR: u64 = 1 << 3;
const MANAGE_GUILD: u64 = 1 << 5;
const MANAGE_MESSAGES: u64 = 1 << 13;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Deserialize, Debug, Clone)]
struct WireUser {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
    #[serde(default)]
    bot: bool,
}

impl WireUser {
    fn into_user(self) -> User {
        let tag = match self.discriminator.as_deref() {
            None | Some("0") | Some("") => self.username,
            Some(d) => format!("{}#{}", self.username, d),
        };
        User {
            id: self.id,
            tag,
            bot: self.bot,
        }
    }
}

#[derive(Deserialize, Debug)]
struct WireGuild {
    id: String,
    name: String,
    #[serde(default)]
    approximate_member_count: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct WireChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    recipients: Vec<WireUser>,
}

#[derive(Deserialize, Debug)]
struct WireRole {
    id: String,
    /// Permission bit set, serialized as a decimal string.
    #[serde(default)]
    permissions: String,
}

#[derive(Deserialize, Debug)]
struct WireMember {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct WireMessage {
    id: String,
    author: WireUser,
    #[serde(default)]
    content: String,
    #[serde(default)]
    member: Option<WireMember>,
}

fn channel_kind(code: u8) -> ChannelKind {
    match code {
        0 | 5 => ChannelKind::Text,
        1 => ChannelKind::Direct,
        4 => ChannelKind::Category,
        _ => ChannelKind::Voice,
    }
}

/// Role permissions of one guild. The `@everyone` role shares the guild's id.
#[derive(Debug, Clone, Default)]
struct GuildPermissions {
    everyone: u64,
    roles: HashMap<Snowflake, u64>,
}

impl GuildPermissions {
    fn from_roles(guild_id: &str, roles: Vec<WireRole>) -> Self {
        let mut permissions = Self::default();
        for role in roles {
            let bits = role.permissions.parse().unwrap_or(0);
            if role.id == guild_id {
                permissions.everyone = bits;
            } else {
                permissions.roles.insert(role.id, bits);
            }
        }
        permissions
    }

    fn resolve(&self, member_roles: &[String]) -> MemberRoles {
        let bits = member_roles
            .iter()
            .filter_map(|id| self.roles.get(id))
            .fold(self.everyone, |acc, bits| acc | bits);
        let admin = bits & ADMINISTRATOR != 0;
        MemberRoles {
            manage_messages: admin || bits & MANAGE_MESSAGES != 0,
            manage_guild: admin || bits & MANAGE_GUILD != 0,
        }
    }
}

/// Direct-message channels and their other participant.
fn direct_channels(channels: Vec<WireChannel>) -> HashMap<Snowflake, User> {
    channels
        .into_iter()
        .filter(|c| channel_kind(c.kind) == ChannelKind::Direct)
        .filter_map(|c| {
            let recipient = c.recipients.into_iter().next()?;
            Some((c.id, recipient.into_user()))
        })
        .collect()
}

// ============================================================================
// Session
// ============================================================================

struct RestSession {
    token: String,
    events: Sender<TransportEvent>,
    /// channel id → newest message id seen (None until seeded)
    cursors: HashMap<Snowflake, Option<Snowflake>>,
    focus: Option<Snowflake>,
    follow_all: bool,
    channel_guilds: HashMap<Snowflake, Snowflake>,
    guild_text_channels: Vec<Snowflake>,
    dm_recipients: HashMap<Snowflake, User>,
    permissions: HashMap<Snowflake, GuildPermissions>,
    poller: Option<JoinHandle<()>>,
}

impl RestSession {
    fn poll_targets(&self) -> BTreeSet<Snowflake> {
        let mut targets: BTreeSet<Snowflake> = self.dm_recipients.keys().cloned().collect();
        if self.follow_all {
            targets.extend(self.guild_text_channels.iter().cloned());
        }
        targets.extend(self.focus.iter().cloned());
        targets
    }

    /// Align the cursor map with the current targets and return them.
    fn plan_cycle(&mut self) -> Vec<(Snowflake, Option<Snowflake>)> {
        let targets = self.poll_targets();
        self.cursors.retain(|id, _| targets.contains(id));
        targets
            .into_iter()
            .map(|id| {
                let cursor = self.cursors.entry(id.clone()).or_insert(None).clone();
                (id, cursor)
            })
            .collect()
    }

    fn origin(&self, channel_id: &str) -> Option<MessageOrigin> {
        if let Some(guild_id) = self.channel_guilds.get(channel_id) {
            return Some(MessageOrigin::Guild {
                guild_id: guild_id.clone(),
                channel_id: channel_id.to_string(),
            });
        }
        self.dm_recipients
            .get(channel_id)
            .map(|recipient| MessageOrigin::Direct {
                channel_id: channel_id.to_string(),
                recipient: recipient.clone(),
            })
    }

    fn roles(&self, origin: &MessageOrigin, member: Option<&WireMember>) -> Option<MemberRoles> {
        match origin {
            MessageOrigin::Guild { guild_id, .. } => {
                let member = member?;
                Some(self.permissions.get(guild_id)?.resolve(&member.roles))
            }
            MessageOrigin::Direct { .. } => None,
        }
    }
}

/// REST transport (one authenticated session at a time).
pub struct RestTransport {
    base_url: String,
    poll_interval: Duration,
    client: reqwest::Client,
    session: Arc<Mutex<Option<RestSession>>>,
}

impl RestTransport {
    pub fn new(base_url: Option<String>, poll_interval: Duration) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            poll_interval,
            client: reqwest::Client::new(),
            session: Arc::new(Mutex::new(None)),
        }
    }

    fn token(&self) -> Result<String, TransportError> {
        self.session
            .lock()
            .map_err(|_| TransportError::NotConnected)?
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(TransportError::NotConnected)
    }

    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut RestSession) -> T,
    ) -> Result<T, TransportError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| TransportError::NotConnected)?;
        guard.as_mut().map(f).ok_or(TransportError::NotConnected)
    }
}

async fn call<T: DeserializeOwned>(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    method: Method,
    path: &str,
    body: Option<serde_json::Value>,
) -> Result<Option<T>, TransportError> {
    let mut request = client
        .request(method.clone(), format!("{}{}", base_url, path))
        .header("Authorization", token);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;

    let status = response.status();
    debug!("{} {} -> {}", method, path, status);

    if status.as_u16() == 401 {
        return Err(TransportError::Auth("invalid token".to_string()));
    }
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("API error on {}: {} - {}", path, status, message);
        return Err(TransportError::Api {
            status: status.as_u16(),
            message,
        });
    }
    if status.as_u16() == 204 {
        return Ok(None);
    }

    let text = response
        .text()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| TransportError::Parse(e.to_string()))
}

async fn fetch_direct_channels(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
) -> Result<HashMap<Snowflake, User>, TransportError> {
    let channels: Vec<WireChannel> =
        call(client, base_url, token, Method::GET, "/users/@me/channels", None)
            .await?
            .unwrap_or_default();
    Ok(direct_channels(channels))
}

async fn poll_loop(
    client: reqwest::Client,
    base_url: String,
    session: Arc<Mutex<Option<RestSession>>>,
    interval: Duration,
) {
    loop {
        tokio::time::sleep(interval).await;

        let Some((token, events)) = (match session.lock() {
            Ok(guard) => guard.as_ref().map(|s| (s.token.clone(), s.events.clone())),
            Err(_) => None,
        }) else {
            return;
        };

        match fetch_direct_channels(&client, &base_url, &token).await {
            Ok(direct) => {
                if let Ok(mut guard) = session.lock()
                    && let Some(s) = guard.as_mut()
                {
                    s.dm_recipients = direct;
                }
            }
            Err(e) => warn!("Refreshing direct channels failed: {}", e),
        }

        let plan = match session.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(s) => s.plan_cycle(),
                None => return,
            },
            Err(_) => return,
        };

        for (channel_id, after) in plan {
            let path = match &after {
                Some(id) => format!("/channels/{}/messages?after={}&limit=50", channel_id, id),
                None => format!("/channels/{}/messages?limit=1", channel_id),
            };
            let fetched: Vec<WireMessage> =
                match call(&client, &base_url, &token, Method::GET, &path, None).await {
                    Ok(Some(list)) => list,
                    Ok(None) => Vec::new(),
                    Err(e) => {
                        warn!("Poll of channel {} failed: {}", channel_id, e);
                        continue;
                    }
                };

            // API returns newest first
            let newest = fetched.first().map(|m| m.id.clone());
            if after.is_some() && !fetched.is_empty() {
                let messages: Vec<InboundMessage> = match session.lock() {
                    Ok(guard) => match guard.as_ref() {
                        Some(s) => match s.origin(&channel_id) {
                            Some(origin) => fetched
                                .into_iter()
                                .rev()
                                .map(|wire| InboundMessage {
                                    roles: s.roles(&origin, wire.member.as_ref()),
                                    id: wire.id,
                                    origin: origin.clone(),
                                    author: wire.author.into_user(),
                                    content: wire.content,
                                })
                                .collect(),
                            None => Vec::new(),
                        },
                        None => return,
                    },
                    Err(_) => return,
                };
                for message in messages {
                    if events.send(TransportEvent::Message(message)).await.is_err() {
                        warn!("Event receiver dropped, stopping poller");
                        return;
                    }
                }
            }

            if let Ok(mut guard) = session.lock()
                && let Some(s) = guard.as_mut()
                && let Some(slot) = s.cursors.get_mut(&channel_id)
            {
                if newest.is_some() || slot.is_none() {
                    *slot = newest.or_else(|| Some("0".to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl Transport for RestTransport {
    fn name(&self) -> &str {
        "rest"
    }

    async fn connect(
        &self,
        token: &str,
        events: Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        let started = Instant::now();
        let me: WireUser = call(&self.client, &self.base_url, token, Method::GET, "/users/@me", None)
            .await?
            .ok_or_else(|| TransportError::Parse("empty user response".to_string()))?;
        let latency_ms = started.elapsed().as_millis() as u64;
        let me = me.into_user();
        info!("Authenticated as {} ({}ms)", me.tag, latency_ms);

        let wire_guilds: Vec<WireGuild> = call(
            &self.client,
            &self.base_url,
            token,
            Method::GET,
            "/users/@me/guilds?with_counts=true",
            None,
        )
        .await?
        .unwrap_or_default();

        let mut guilds = Vec::with_capacity(wire_guilds.len());
        let mut channel_guilds = HashMap::new();
        let mut guild_text_channels = Vec::new();
        let mut permissions = HashMap::new();
        for wire in wire_guilds {
            let channels: Vec<WireChannel> = call(
                &self.client,
                &self.base_url,
                token,
                Method::GET,
                &format!("/guilds/{}/channels", wire.id),
                None,
            )
            .await?
            .unwrap_or_default();
            let channels: Vec<Channel> = channels
                .into_iter()
                .map(|c| Channel {
                    id: c.id,
                    name: c.name.unwrap_or_default(),
                    kind: channel_kind(c.kind),
                })
                .collect();
            for channel in &channels {
                channel_guilds.insert(channel.id.clone(), wire.id.clone());
                if channel.is_text() {
                    guild_text_channels.push(channel.id.clone());
                }
            }

            // Without roles no moderation glyphs are shown; not worth failing login over
            let roles: Vec<WireRole> = match call(
                &self.client,
                &self.base_url,
                token,
                Method::GET,
                &format!("/guilds/{}/roles", wire.id),
                None,
            )
            .await
            {
                Ok(roles) => roles.unwrap_or_default(),
                Err(e) => {
                    warn!("Fetching roles of guild {} failed: {}", wire.id, e);
                    Vec::new()
                }
            };
            permissions.insert(wire.id.clone(), GuildPermissions::from_roles(&wire.id, roles));

            guilds.push(Guild {
                id: wire.id,
                name: wire.name,
                member_count: wire.approximate_member_count.unwrap_or(0),
                channels,
            });
        }

        let dm_recipients = fetch_direct_channels(&self.client, &self.base_url, token)
            .await
            .unwrap_or_else(|e| {
                warn!("Fetching direct channels failed: {}", e);
                HashMap::new()
            });
        debug!("{} direct channels", dm_recipients.len());

        let poller = tokio::spawn(poll_loop(
            self.client.clone(),
            self.base_url.clone(),
            self.session.clone(),
            self.poll_interval,
        ));

        {
            let mut guard = self
                .session
                .lock()
                .map_err(|_| TransportError::NotConnected)?;
            if let Some(old) = guard.take()
                && let Some(handle) = old.poller
            {
                handle.abort();
            }
            *guard = Some(RestSession {
                token: token.to_string(),
                events: events.clone(),
                cursors: HashMap::new(),
                focus: None,
                follow_all: false,
                channel_guilds,
                guild_text_channels,
                dm_recipients,
                permissions,
                poller: Some(poller),
            });
        }

        events
            .send(TransportEvent::Ready {
                user: me,
                token: token.to_string(),
                guilds,
                latency_ms,
            })
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let old = self
            .session
            .lock()
            .map_err(|_| TransportError::NotConnected)?
            .take();
        if let Some(session) = old
            && let Some(handle) = session.poller
        {
            handle.abort();
            info!("Disconnected");
        }
        Ok(())
    }

    async fn watch(&self, channel_id: &str) -> Result<(), TransportError> {
        self.with_session(|s| s.focus = Some(channel_id.to_string()))
    }

    async fn follow_all(&self, enabled: bool) -> Result<(), TransportError> {
        self.with_session(|s| s.follow_all = enabled)?;
        info!("Following all channels: {}", enabled);
        Ok(())
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<Snowflake, TransportError> {
        let token = self.token()?;
        let sent: WireMessage = call(
            &self.client,
            &self.base_url,
            &token,
            Method::POST,
            &format!("/channels/{}/messages", channel_id),
            Some(serde_json::json!({ "content": content })),
        )
        .await?
        .ok_or_else(|| TransportError::Parse("empty message response".to_string()))?;
        Ok(sent.id)
    }

    async fn send_direct(&self, user_id: &str, content: &str) -> Result<Snowflake, TransportError> {
        let token = self.token()?;
        let dm: WireChannel = call(
            &self.client,
            &self.base_url,
            &token,
            Method::POST,
            "/users/@me/channels",
            Some(serde_json::json!({ "recipient_id": user_id })),
        )
        .await?
        .ok_or_else(|| TransportError::Parse("empty channel response".to_string()))?;

        if let Some(recipient) = dm.recipients.into_iter().next() {
            self.with_session(|s| {
                s.dm_recipients.insert(dm.id.clone(), recipient.into_user());
            })?;
        }

        self.send(&dm.id, content).await
    }

    async fn start_typing(&self, channel_id: &str) -> Result<(), TransportError> {
        let token = self.token()?;
        call::<serde_json::Value>(
            &self.client,
            &self.base_url,
            &token,
            Method::POST,
            &format!("/channels/{}/typing", channel_id),
            None,
        )
        .await
        .map(|_| ())
    }

    async fn stop_typing(&self, _channel_id: &str) -> Result<(), TransportError> {
        // The REST API has no explicit stop; the indicator lapses on its own.
        Ok(())
    }

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), TransportError> {
        let token = self.token()?;
        call::<serde_json::Value>(
            &self.client,
            &self.base_url,
            &token,
            Method::PATCH,
            &format!("/channels/{}/messages/{}", channel_id, message_id),
            Some(serde_json::json!({ "content": content })),
        )
        .await
        .map(|_| ())
    }

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), TransportError> {
        let token = self.token()?;
        call::<serde_json::Value>(
            &self.client,
            &self.base_url,
            &token,
            Method::DELETE,
            &format!("/channels/{}/messages/{}", channel_id, message_id),
            None,
        )
        .await
        .map(|_| ())
    }
}
