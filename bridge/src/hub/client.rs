use crate::hub::BroadcastHub;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;
use warp::ws::{Message, WebSocket};

/// One connected viewer: a bounded queue drained into its socket.
pub struct ViewerClient {
    id: Uuid,
    pub(crate) outgoing: mpsc::Receiver<Bytes>,
}

impl ViewerClient {
    /// Returns the client and the sender the hub fans out to.
    pub fn new(capacity: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, outgoing) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                id: Uuid::new_v4(),
                outgoing,
            },
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pumps queued payloads to the socket until the viewer goes away, then
    /// unregisters from `hub`. Anything the viewer sends is ignored.
    pub async fn run(mut self, socket: WebSocket, hub: BroadcastHub) {
        info!("Viewer {} connected ({} viewers)", self.id, hub.len());
        let (mut sink, mut stream) = socket.split();
        let (closed_tx, mut closed) = oneshot::channel::<()>();
        let id = self.id;
        let listener = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(message) if message.is_close() => break,
                    Ok(_) => {}
                    Err(err) => {
                        debug!("Viewer {} read failed: {}", id, err);
                        break;
                    }
                }
            }
            let _ = closed_tx.send(());
        });

        loop {
            tokio::select! {
                _ = &mut closed => break,
                payload = self.outgoing.recv() => match payload {
                    Some(payload) => {
                        if let Err(err) = sink.send(to_message(payload)).await {
                            debug!("Viewer {} write failed: {}", self.id, err);
                        }
                    }
                    None => break,
                }
            }
        }

        hub.remove(&self.id);
        listener.abort();
        let _ = sink.close().await;
        info!("Viewer {} disconnected ({} viewers)", self.id, hub.len());
    }
}

fn to_message(payload: Bytes) -> Message {
    match std::str::from_utf8(&payload) {
        Ok(text) => Message::text(text),
        Err(_) => Message::binary(payload.to_vec()),
    }
}
