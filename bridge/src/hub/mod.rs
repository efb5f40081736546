//! Viewer-facing side of the bridge: a WebSocket endpoint that fans every
//! outbound snapshot out to all connected viewers.

pub mod client;

pub use client::ViewerClient;

use bytes::Bytes;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::ws::{WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

#[derive(Clone)]
pub struct BroadcastHub {
    viewers: Arc<RwLock<HashMap<Uuid, mpsc::Sender<Bytes>>>>,
    queue_capacity: usize,
}

impl BroadcastHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            viewers: Arc::new(RwLock::new(HashMap::new())),
            queue_capacity,
        }
    }

    /// WebSocket upgrade route mounted at `path` (`/` for the root).
    pub fn routes(&self, path: &str) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let hub = self.clone();
        let hub_filter = warp::any().map(move || hub.clone());
        mount(path)
            .and(warp::path::end())
            .and(warp::ws())
            .and(hub_filter)
            .map(|ws: Ws, hub: BroadcastHub| ws.on_upgrade(move |socket| hub.accept(socket)))
    }

    /// Registers a freshly upgraded viewer and serves it until it leaves.
    pub async fn accept(self, socket: WebSocket) {
        let (queue, client) = ViewerClient::new(self.queue_capacity);
        self.viewers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client.id(), queue);
        client.run(socket, self).await;
    }

    /// Offers `payload` to every viewer without blocking. A viewer whose
    /// queue is full misses this payload. Returns how many accepted it.
    pub fn broadcast(&self, payload: Bytes) -> usize {
        let viewers = self.viewers.read().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        for (id, queue) in viewers.iter() {
            match queue.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => warn!("Viewer {} queue full, dropping frame", id),
                Err(TrySendError::Closed(_)) => debug!("Viewer {} already gone", id),
            }
        }
        delivered
    }

    /// Drains the shared outbound channel into [`broadcast`](Self::broadcast).
    pub async fn pump(self, mut outbound: mpsc::Receiver<Bytes>) {
        while let Some(payload) = outbound.recv().await {
            self.broadcast(payload);
        }
        debug!("Outbound channel closed, hub pump stopped");
    }

    pub fn len(&self) -> usize {
        self.viewers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn remove(&self, id: &Uuid) {
        self.viewers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}

fn mount(path: &str) -> BoxedFilter<()> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(warp::any().boxed(), |filter, segment| {
            filter.and(warp::path(segment.to_string())).boxed()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::testing::eventually;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    fn serve(hub: &BroadcastHub, path: &str) -> std::net::SocketAddr {
        let (addr, server) = warp::serve(hub.routes(path)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[tokio::test]
    async fn broadcast_reaches_every_viewer() {
        let hub = BroadcastHub::new(4);
        let addr = serve(&hub, "/");
        let (mut first, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        let (mut second, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        assert!(eventually(Duration::from_secs(2), || hub.len() == 2).await);

        assert_eq!(hub.broadcast(Bytes::from_static(br#"{"version":2}"#)), 2);
        for viewer in [&mut first, &mut second] {
            let message = viewer.next().await.unwrap().unwrap();
            assert_eq!(message, Message::Text(r#"{"version":2}"#.to_string()));
        }

        first.close(None).await.unwrap();
        assert!(eventually(Duration::from_secs(2), || hub.len() == 1).await);
        drop(second);
        assert!(eventually(Duration::from_secs(2), || hub.is_empty()).await);
    }

    #[tokio::test]
    async fn viewer_messages_are_ignored() {
        let hub = BroadcastHub::new(4);
        let addr = serve(&hub, "/viz/live");
        let (mut viewer, _) = connect_async(format!("ws://{}/viz/live", addr)).await.unwrap();
        assert!(eventually(Duration::from_secs(2), || hub.len() == 1).await);

        viewer.send(Message::Text("hello".into())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hub.len(), 1);
        assert_eq!(hub.broadcast(Bytes::from_static(b"{}")), 1);
        assert_eq!(viewer.next().await.unwrap().unwrap(), Message::Text("{}".into()));
    }

    #[tokio::test]
    async fn full_viewer_queue_drops_instead_of_blocking() {
        let hub = BroadcastHub::new(2);
        let (queue, _client) = ViewerClient::new(2);
        hub.viewers.write().unwrap().insert(Uuid::new_v4(), queue);

        assert_eq!(hub.broadcast(Bytes::from_static(b"1")), 1);
        assert_eq!(hub.broadcast(Bytes::from_static(b"2")), 1);
        assert_eq!(hub.broadcast(Bytes::from_static(b"3")), 0);
    }

    #[tokio::test]
    async fn pump_forwards_outbound_payloads() {
        let hub = BroadcastHub::new(4);
        let (queue, mut client) = ViewerClient::new(4);
        hub.viewers.write().unwrap().insert(client.id(), queue);

        let (tx, rx) = mpsc::channel(8);
        let pump = tokio::spawn(hub.clone().pump(rx));
        tx.send(Bytes::from_static(b"frame")).await.unwrap();
        assert_eq!(client.outgoing.recv().await.unwrap(), Bytes::from_static(b"frame"));

        drop(tx);
        pump.await.unwrap();
    }
}
