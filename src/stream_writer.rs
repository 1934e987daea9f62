use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::message_types::ReplyReceiver;
use crate::wire::primitive::put_u32;

/// Writes [`crate::facade_task::FacadeTask`] replies back to the connection.
pub struct StreamWriter {
    writehalf: OwnedWriteHalf,
    reply_recv: ReplyReceiver,
}

impl StreamWriter {
    /// Spawns the task for one connection.
    pub fn spawn(writehalf: OwnedWriteHalf, reply_recv: ReplyReceiver) -> JoinHandle<()> {
        tokio::spawn(Self { writehalf, reply_recv }.run())
    }

    async fn run(mut self) {
        while let Some(reply) = self.reply_recv.recv().await {
            let mut body = Vec::new();
            let serialized = put_u32(&mut body, reply.xid)
                .and_then(|_| reply.result.serialize(&mut body));
            if let Err(err) = serialized {
                warn!(%err, "dropping connection on unserializable reply");
                return;
            }
            if let Err(err) = self.write_frame(&body).await {
                warn!(%err, "dropping connection on write error");
                return;
            }
        }
    }

    async fn write_frame(&mut self, body: &[u8]) -> std::io::Result<()> {
        self.writehalf.write_u32(body.len() as u32).await?;
        self.writehalf.write_all(body).await?;
        self.writehalf.flush().await
    }
}
