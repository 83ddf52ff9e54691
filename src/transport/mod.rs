pub mod connection;
pub mod rest;
pub mod types;

pub use connection::{Transport, TransportError};
pub use rest::RestTransport;
pub use types::{
    Channel, ChannelKind, Guild, InboundMessage, MemberRoles, MessageOrigin, Snowflake,
    TransportEvent, User,
};
