//! Adapters implementing the outbound ports.

pub mod channel;

pub use channel::{channel_source, channel_writer, ChannelSource, ChannelWriter, KeyPrefixClassifier};
