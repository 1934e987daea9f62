//! poolfs - a user-space network filesystem over a flat pool of
//! UUID-identified objects.
//!
//! Objects live under one prefix directory, named by UUID; directories are
//! realized as symbolic links to UUID-named entries. The pool is reached
//! through the [`facade`] traits, either locally ([`store`] + [`cache`]) or
//! over the [`wire`] protocol ([`client`], [`handle_forever`]). A FUSE
//! binding over any high facade lives in [`fuse`].

pub mod cache;
pub mod client;
pub mod config;
pub mod facade;
mod facade_task;
pub mod fuse;
mod message_types;
mod read_task;
pub mod store;
mod stream_writer;
pub mod wire;

pub use facade::{Error, Facade, HighFacade, LowFacade, PartialRead, Result, Statbuf, ROOT_OBJECT};
pub use uuid::Uuid;

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::info;

use crate::facade_task::FacadeTask;
use crate::message_types::{call_channel, reply_channel};
use crate::read_task::ReadTask;
use crate::stream_writer::StreamWriter;

/// Serves one facade to remote clients, forever.
///
/// Exactly one facade is exposed per server; every accepted connection talks
/// to it. Calls on one connection are applied in the order they arrive.
pub async fn handle_forever<F>(listener: TcpListener, facade: Arc<F>) -> std::io::Result<()>
where
    F: HighFacade + Send + Sync + 'static,
{
    loop {
        let (socket, peer) = listener.accept().await?;

        socket.set_nodelay(true)?;
        info!(%peer, "pool client connected");

        process_socket(socket, Arc::clone(&facade));
    }
}

fn process_socket<F>(socket: TcpStream, facade: Arc<F>)
where
    F: HighFacade + Send + Sync + 'static,
{
    let (readhalf, writehalf) = socket.into_split();

    let (call_send, call_recv) = call_channel();
    let (reply_send, reply_recv) = reply_channel();

    ReadTask::spawn(readhalf, call_send);
    FacadeTask::spawn(call_recv, reply_send, facade);
    StreamWriter::spawn(writehalf, reply_recv);
}
