//! Cached view of what the transport has told us: who we are, which guilds
//! we can see, and which users we have met.

use std::collections::HashMap;

use crate::transport::{Guild, Snowflake, User};

#[derive(Debug, Default)]
pub struct Directory {
    me: Option<User>,
    latency_ms: u64,
    guilds: Vec<Guild>,
    users: HashMap<Snowflake, User>,
}

impl Directory {
    pub fn on_ready(&mut self, me: User, guilds: Vec<Guild>, latency_ms: u64) {
        self.remember(me.clone());
        self.me = Some(me);
        self.guilds = guilds;
        self.latency_ms = latency_ms;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn me(&self) -> Option<&User> {
        self.me.as_ref()
    }

    pub fn is_me(&self, id: &str) -> bool {
        self.me.as_ref().is_some_and(|me| me.id == id)
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn guilds(&self) -> &[Guild] {
        &self.guilds
    }

    pub fn guild(&self, id: &str) -> Option<&Guild> {
        self.guilds.iter().find(|g| g.id == id)
    }

    /// Lookup by id, falling back to an exact name match.
    pub fn find_guild(&self, key: &str) -> Option<&Guild> {
        self.guild(key)
            .or_else(|| self.guilds.iter().find(|g| g.name == key))
    }

    /// Adds or replaces a guild.
    pub fn upsert_guild(&mut self, guild: Guild) {
        match self.guilds.iter_mut().find(|g| g.id == guild.id) {
            Some(existing) => *existing = guild,
            None => self.guilds.push(guild),
        }
    }

    pub fn remove_guild(&mut self, id: &str) -> Option<Guild> {
        let index = self.guilds.iter().position(|g| g.id == id)?;
        Some(self.guilds.remove(index))
    }

    pub fn remember(&mut self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn has_user(&self, id: &str) -> bool {
        self.users.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{guild, user};

    #[test]
    fn test_ready_populates_me_and_guilds() {
        let mut dir = Directory::default();
        dir.on_ready(user("1", "me", false), vec![guild("g1", "Home", &["general"])], 42);
        assert!(dir.is_me("1"));
        assert!(dir.has_user("1"));
        assert_eq!(dir.latency_ms(), 42);
        assert_eq!(dir.guild("g1").unwrap().name, "Home");
    }

    #[test]
    fn test_find_guild_by_name() {
        let mut dir = Directory::default();
        dir.upsert_guild(guild("g1", "Home", &[]));
        assert_eq!(dir.find_guild("Home").unwrap().id, "g1");
        assert!(dir.find_guild("Away").is_none());
    }

    #[test]
    fn test_upsert_replaces_and_remove() {
        let mut dir = Directory::default();
        dir.upsert_guild(guild("g1", "Old", &[]));
        dir.upsert_guild(guild("g1", "New", &[]));
        assert_eq!(dir.guilds().len(), 1);
        assert_eq!(dir.guild("g1").unwrap().name, "New");
        assert_eq!(dir.remove_guild("g1").unwrap().name, "New");
        assert!(dir.remove_guild("g1").is_none());
    }
}
