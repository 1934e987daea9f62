use tokio::sync::mpsc;

use crate::wire::records::{Request, Response};

/// A parsed call with its transaction id, awaiting execution.
pub struct Call {
    pub xid: u32,
    pub args: Request,
}

/// An executed call's response, ready for the stream writer.
pub struct Reply {
    pub xid: u32,
    pub result: Response,
}

pub type CallSender = mpsc::UnboundedSender<Call>;
pub type CallReceiver = mpsc::UnboundedReceiver<Call>;
pub type ReplySender = mpsc::UnboundedSender<Reply>;
pub type ReplyReceiver = mpsc::UnboundedReceiver<Reply>;

/// Creates the call channel between the read task and the facade task.
pub fn call_channel() -> (CallSender, CallReceiver) {
    mpsc::unbounded_channel()
}

/// Creates the reply channel between the facade task and the stream writer.
pub fn reply_channel() -> (ReplySender, ReplyReceiver) {
    mpsc::unbounded_channel()
}
