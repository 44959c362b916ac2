use anyhow::anyhow;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::protocol::Message;
use crate::transport::Transport;

/// One end of an in-process connection.
pub struct InMemoryTransport {
    outgoing: UnboundedSender<Message>,
    incoming: UnboundedReceiver<Message>,
}

impl InMemoryTransport {
    /// Two connected ends; what one sends the other receives.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        (
            Self {
                outgoing: tx_a,
                incoming: rx_b,
            },
            Self {
                outgoing: tx_b,
                incoming: rx_a,
            },
        )
    }
}

#[async_trait::async_trait]
impl Transport for InMemoryTransport {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        self.outgoing
            .send(msg)
            .map_err(|_| anyhow!("Channel closed"))
    }

    async fn recv(&mut self) -> anyhow::Result<Message> {
        self.incoming
            .recv()
            .await
            .ok_or_else(|| anyhow!("Channel closed"))
    }
}
