use crate::protocol::Message;

/// A bidirectional, message-framed connection.
///
/// `recv` must be cancel-safe: a session selects between an incoming
/// message and outgoing room events, and a dropped `recv` future must not
/// lose a partially read frame.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()>;
    async fn recv(&mut self) -> anyhow::Result<Message>;
}

pub mod in_memory;
pub mod tcp;
