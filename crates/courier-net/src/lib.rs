// Network layer: REST backend client and the realtime WebSocket channel.

pub mod api;
pub mod realtime;

pub use api::{classify_status, Backend, HttpBackend};
pub use realtime::{
    spawn_channel, ChannelCommand, ChannelConfig, ChannelHandle, ChannelNotification,
    ReconnectPolicy,
};
