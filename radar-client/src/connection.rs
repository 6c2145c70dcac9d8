//! Connection runtime (spec §4.3, §4.8): drives one TCP connection's
//! read loop and periodic timeout tick, handing decoded frames and
//! timeout ticks off to a `ConnectionHandler`.
//!
//! The read half and write half are split up front via
//! `into_split()` — a `tokio::select!` that read and wrote through the
//! same `&mut TcpStream` in two branches would need two concurrent
//! mutable borrows of one value, which doesn't borrow-check. Each
//! branch here only ever touches its own half.

use std::time::Duration;

use async_trait::async_trait;
use radar_proto::wire::{self, Frame};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How often `on_timeout` fires while a connection is open (spec §4.3).
pub const CONNECTION_TICK: Duration = Duration::from_millis(200);

#[async_trait]
pub trait ConnectionHandler: Send {
    async fn on_receive(&mut self, frame: Frame);
    async fn on_timeout(&mut self, writer: &mut OwnedWriteHalf);
    async fn on_disconnect(&mut self);
}

/// Drives `handler` against one connection until the stream closes, a
/// protocol error occurs, or `stop` is cancelled. Always calls
/// `on_disconnect` exactly once before returning.
pub async fn run<H: ConnectionHandler>(
    stream: tokio::net::TcpStream,
    max_frame_len: u32,
    stop: CancellationToken,
    handler: &mut H,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut tick = interval(CONNECTION_TICK);
    // The first tick fires immediately; that's fine, on_timeout is a
    // no-op when there's nothing queued to send.

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                debug!("connection runtime stopping");
                break;
            }
            result = wire::read_frame(&mut reader, max_frame_len) => {
                match result {
                    Ok(frame) => handler.on_receive(frame).await,
                    Err(e) => {
                        warn!("connection read failed: {e}");
                        break;
                    }
                }
            }
            _ = tick.tick() => {
                handler.on_timeout(&mut writer).await;
            }
        }
    }

    handler.on_disconnect().await;
}
