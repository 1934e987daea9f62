use std::sync::Arc;

use tokio::task::{self, JoinHandle};
use uuid::Uuid;

use crate::facade::{self, HighFacade, PartialRead};
use crate::message_types::{CallReceiver, Reply, ReplySender};
use crate::wire::records::{
    AckReply, DataReply, ErrorEnvelope, IdReply, NamesReply, Request, Response, StatReply,
    WriteReply,
};
use crate::wire::parse_uuid;

/// Executes parsed calls against the connection's facade, in arrival order,
/// and hands the replies to [`crate::stream_writer::StreamWriter`].
///
/// The facade is synchronous; each call runs on the blocking pool.
pub struct FacadeTask<F> {
    call_recv: CallReceiver,
    reply_send: ReplySender,
    facade: Arc<F>,
}

impl<F: HighFacade + Send + Sync + 'static> FacadeTask<F> {
    /// Spawns the task for one connection.
    pub fn spawn(
        call_recv: CallReceiver,
        reply_send: ReplySender,
        facade: Arc<F>,
    ) -> JoinHandle<()> {
        tokio::spawn(Self { call_recv, reply_send, facade }.run())
    }

    async fn run(mut self) {
        while let Some(call) = self.call_recv.recv().await {
            let facade = Arc::clone(&self.facade);
            let executed = task::spawn_blocking(move || execute(facade.as_ref(), call.args)).await;
            let Ok(result) = executed else { return };
            if self.reply_send.send(Reply { xid: call.xid, result }).is_err() {
                return;
            }
        }
    }
}

/// Recovers the object UUID from its raw wire form.
fn object_id(raw: &[u8]) -> facade::Result<Uuid> {
    parse_uuid(raw).ok_or(facade::Error::InvalidArgument("malformed object id"))
}

fn raw_id(id: &Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn execute<F: HighFacade>(facade: &F, request: Request) -> Response {
    match request {
        Request::Lookup(q) => {
            let res = object_id(&q.id).and_then(|id| facade.lookup(&id, &q.name));
            id_reply(res)
        }
        Request::Chtimes(q) => {
            let res = object_id(&q.id).and_then(|id| facade.chtimes(&id, q.atime, q.mtime));
            ack_reply(res)
        }
        Request::Truncate(q) => {
            let res = object_id(&q.id).and_then(|id| facade.truncate(&id, q.size));
            ack_reply(res)
        }
        Request::WriteAt(q) => {
            let res = object_id(&q.id).and_then(|id| facade.write_at(&id, &q.data, q.offset));
            Response::Write(WriteReply {
                count: *res.as_ref().unwrap_or(&0) as u32,
                err: ErrorEnvelope::from_result(&res),
            })
        }
        Request::Readdir(q) => {
            let res = object_id(&q.id).and_then(|id| facade.readdirnames(&id));
            Response::Names(NamesReply {
                err: ErrorEnvelope::from_result(&res),
                names: res.unwrap_or_default(),
            })
        }
        Request::HlMkdir(q) => {
            let res = object_id(&q.id).and_then(|id| facade.hl_mkdir(&id, &q.name));
            id_reply(res)
        }
        Request::HlMkfile(q) => {
            let res = object_id(&q.id).and_then(|id| facade.hl_mkfile(&id, &q.name));
            id_reply(res)
        }
        Request::HlStat(q) => {
            let res = object_id(&q.id).and_then(|id| facade.hl_stat(&id));
            Response::Stat(StatReply {
                err: ErrorEnvelope::from_result(&res),
                stat: res.ok(),
            })
        }
        Request::HlDelete(q) => {
            let res = object_id(&q.id).and_then(|id| facade.hl_delete(&id, &q.name));
            ack_reply(res)
        }
        Request::HlReadAt(q) => {
            // Served by the size-based variant; the caller's buffer never
            // crosses the wire. A failed read still ships its prefix.
            let read = match object_id(&q.id) {
                Ok(id) => facade.hl_read_at2(&id, q.size as usize, q.offset),
                Err(err) => PartialRead { data: Vec::new(), error: Some(err) },
            };
            Response::Data(DataReply {
                err: ErrorEnvelope::from_option(&read.error),
                data: read.data,
            })
        }
        Request::HlMovelink(q) => {
            let res = object_id(&q.old_id).and_then(|old| {
                object_id(&q.new_id)
                    .and_then(|new| facade.hl_movelink(&old, &q.old_name, &new, &q.new_name))
            });
            ack_reply(res)
        }
    }
}

fn id_reply(res: facade::Result<Uuid>) -> Response {
    Response::Id(IdReply {
        err: ErrorEnvelope::from_result(&res),
        id: res.map(|id| raw_id(&id)).unwrap_or_default(),
    })
}

fn ack_reply(res: facade::Result<()>) -> Response {
    Response::Ack(AckReply { err: ErrorEnvelope::from_result(&res) })
}
