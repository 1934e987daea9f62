use std::io::Cursor;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::message_types::{Call, CallSender};
use crate::wire::{self, primitive, records::Request};

/// Reads call frames from a connection, parses them, and forwards them to
/// the [`crate::facade_task::FacadeTask`].
pub struct ReadTask {
    readhalf: OwnedReadHalf,
    call_send: CallSender,
}

impl ReadTask {
    /// Spawns the task for one connection.
    pub fn spawn(readhalf: OwnedReadHalf, call_send: CallSender) -> JoinHandle<()> {
        tokio::spawn(Self { readhalf, call_send }.run())
    }

    async fn run(mut self) {
        loop {
            let body = match self.read_frame().await {
                Ok(body) => body,
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("pool client disconnected");
                    return;
                }
                Err(err) => {
                    warn!(%err, "dropping connection on stream error");
                    return;
                }
            };
            let mut src = Cursor::new(body.as_slice());
            let call = match parse_call(&mut src) {
                Ok(call) => call,
                Err(err) => {
                    warn!(%err, "dropping connection on malformed call");
                    return;
                }
            };
            if self.call_send.send(call).is_err() {
                return;
            }
        }
    }

    async fn read_frame(&mut self) -> std::io::Result<Vec<u8>> {
        let len = self.readhalf.read_u32().await? as usize;
        if len > wire::MAX_FRAME_LEN {
            return Err(std::io::Error::other("frame exceeds length limit"));
        }
        let mut body = vec![0u8; len];
        self.readhalf.read_exact(&mut body).await?;
        Ok(body)
    }
}

fn parse_call(src: &mut Cursor<&[u8]>) -> wire::Result<Call> {
    let xid = primitive::u32(src)?;
    let args = Request::parse(src)?;
    Ok(Call { xid, args })
}
