use crate::link::{LinkConfig, RadarUnitLink};
use bytes::Bytes;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Identified unit links keyed by MAC address.
#[derive(Clone)]
pub struct UnitRegistry {
    units: Arc<RwLock<HashMap<String, RadarUnitLink>>>,
    /// Every started link, identified or not, until it is closed.
    started: Arc<Mutex<Vec<RadarUnitLink>>>,
    config: LinkConfig,
    outbound: mpsc::Sender<Bytes>,
}

impl UnitRegistry {
    pub fn new(config: LinkConfig, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            units: Arc::new(RwLock::new(HashMap::new())),
            started: Arc::new(Mutex::new(Vec::new())),
            config,
            outbound,
        }
    }

    /// Starts a link to `address`. It joins the registry once its handshake
    /// reports a MAC; a link already registered under that MAC is closed.
    pub fn add_unit(&self, address: &str) -> RadarUnitLink {
        let link = RadarUnitLink::spawn(address, self.config.clone(), self.outbound.clone());
        {
            let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
            started.retain(|link| !link.is_closed());
            started.push(link.clone());
        }
        let registry = self.clone();
        let pending = link.clone();
        tokio::spawn(async move {
            if let Some(mac) = pending.wait_identified().await {
                registry.register(mac, pending);
            }
        });
        link
    }

    pub(crate) fn register(&self, mac: String, link: RadarUnitLink) {
        if link.is_closed() {
            debug!("Not registering closed link to {} ({})", link.address(), mac);
            return;
        }
        let previous = self
            .units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(mac.clone(), link.clone());
        match previous {
            Some(previous) if !previous.same_link(&link) => {
                info!(
                    "Unit {} re-registered from {}, closing link to {}",
                    mac,
                    link.address(),
                    previous.address()
                );
                previous.close();
            }
            Some(_) => {}
            None => info!("Unit {} registered from {}", mac, link.address()),
        }
    }

    pub fn get(&self, mac: &str) -> Option<RadarUnitLink> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(mac)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.units.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hardware addresses of every registered unit, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut macs: Vec<String> = self
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        macs.sort();
        macs
    }

    /// Closes and forgets every link, including those still connecting.
    pub fn shutdown(&self) {
        let mut drained: Vec<RadarUnitLink> = self
            .units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, link)| link)
            .collect();
        drained.append(&mut self.started.lock().unwrap_or_else(PoisonError::into_inner));
        for link in drained {
            link.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::testing::{eventually, fake_sensor, sensor_metadata, test_config};
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test]
    async fn same_mac_keeps_only_latest_link() {
        let mut sensor = fake_sensor(sensor_metadata("mast", "24:0a:c4:00:11:22")).await;
        let (tx, _rx) = mpsc::channel(8);
        let registry = UnitRegistry::new(test_config(1, 16), tx);

        let first = registry.add_unit(&sensor.address);
        let mut first_socket = sensor.accepted.recv().await.unwrap();
        assert!(
            eventually(Duration::from_secs(2), || {
                registry.get("24:0a:c4:00:11:22").map(|l| l.same_link(&first)) == Some(true)
            })
            .await
        );

        let second = registry.add_unit(&sensor.address);
        let _second_socket = sensor.accepted.recv().await.unwrap();
        assert!(
            eventually(Duration::from_secs(2), || {
                registry.get("24:0a:c4:00:11:22").map(|l| l.same_link(&second)) == Some(true)
            })
            .await
        );

        assert_eq!(registry.len(), 1);
        assert!(first.is_closed());
        assert!(!second.is_closed());

        let closing = tokio::time::timeout(Duration::from_secs(2), first_socket.next())
            .await
            .unwrap();
        assert!(matches!(closing, Some(Ok(Message::Close(_))) | None | Some(Err(_))));

        registry.shutdown();
        assert!(registry.is_empty());
        assert!(second.is_closed());
    }

    #[tokio::test]
    async fn distinct_units_are_listed_by_mac() {
        let sensor_a = fake_sensor(sensor_metadata("a", "bb:00")).await;
        let sensor_b = fake_sensor(sensor_metadata("b", "aa:00")).await;
        let (tx, _rx) = mpsc::channel(8);
        let registry = UnitRegistry::new(test_config(1, 16), tx);

        registry.add_unit(&sensor_a.address);
        registry.add_unit(&sensor_b.address);
        assert!(eventually(Duration::from_secs(2), || registry.len() == 2).await);
        assert_eq!(registry.addresses(), vec!["aa:00".to_string(), "bb:00".to_string()]);
        registry.shutdown();
    }

    #[tokio::test]
    async fn unreachable_unit_is_never_registered() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("ws://{}/ws", listener.local_addr().unwrap());
        drop(listener);
        let (tx, _rx) = mpsc::channel(8);
        let registry = UnitRegistry::new(test_config(1, 16), tx);

        let link = registry.add_unit(&address);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(registry.is_empty());
        link.close();
        assert!(link.is_closed());
    }

    #[tokio::test]
    async fn shutdown_closes_links_still_connecting() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("ws://{}/ws", listener.local_addr().unwrap());
        drop(listener);
        let (tx, _rx) = mpsc::channel(8);
        let registry = UnitRegistry::new(test_config(1, 16), tx);

        let link = registry.add_unit(&address);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.is_empty());
        assert!(!link.is_closed());

        registry.shutdown();
        assert!(link.is_closed());
        assert_eq!(link.wait_identified().await, None);
    }

    #[tokio::test]
    async fn closed_link_is_not_registered() {
        let (tx, _rx) = mpsc::channel(8);
        let registry = UnitRegistry::new(test_config(1, 16), tx.clone());
        let link = RadarUnitLink::new("ws://127.0.0.1:9/ws", test_config(1, 16), tx);
        link.close();
        registry.register("dd:01".to_string(), link);
        assert!(registry.get("dd:01").is_none());
    }
}
