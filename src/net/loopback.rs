use log::debug;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::error::NetError;
use super::transport::{PeerTransport, TransportEvent};

#[derive(Default)]
struct Endpoint {
    inbox: VecDeque<TransportEvent>,
    peer: Option<usize>,
    listening_on: Option<String>,
}

#[derive(Default)]
struct Hub {
    endpoints: Vec<Endpoint>,
    listeners: HashMap<String, usize>,
    stalled: bool,
}

/// 进程内的配对网络，供测试与本地演示使用。
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    hub: Rc<RefCell<Hub>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self) -> LoopbackTransport {
        let mut hub = self.hub.borrow_mut();
        hub.endpoints.push(Endpoint::default());
        LoopbackTransport {
            hub: Rc::clone(&self.hub),
            id: hub.endpoints.len() - 1,
        }
    }

    /// 停滞时 `connect` 成功返回但永远不会打开通道。
    pub fn set_stalled(&self, stalled: bool) {
        self.hub.borrow_mut().stalled = stalled;
    }
}

pub struct LoopbackTransport {
    hub: Rc<RefCell<Hub>>,
    id: usize,
}

impl PeerTransport for LoopbackTransport {
    fn listen(&mut self, address: &str) -> Result<(), NetError> {
        let mut hub = self.hub.borrow_mut();
        if hub.listeners.contains_key(address) {
            return Err(NetError::connection(format!("address {address} is taken")));
        }
        hub.listeners.insert(address.to_string(), self.id);
        hub.endpoints[self.id].listening_on = Some(address.to_string());
        debug!("[PEER] loopback endpoint {} listening on {}", self.id, address);
        Ok(())
    }

    fn connect(&mut self, address: &str) -> Result<(), NetError> {
        let mut hub = self.hub.borrow_mut();
        let host = *hub.listeners.get(address).ok_or_else(|| NetError::RoomNotFound {
            room: address.to_string(),
        })?;
        if host == self.id {
            return Err(NetError::connection("cannot join your own room"));
        }
        if hub.endpoints[host].peer.is_some() {
            return Err(NetError::connection("room is full"));
        }
        if hub.stalled {
            return Ok(());
        }

        hub.endpoints[host].peer = Some(self.id);
        hub.endpoints[self.id].peer = Some(host);
        hub.endpoints[host].inbox.push_back(TransportEvent::Opened);
        hub.endpoints[self.id].inbox.push_back(TransportEvent::Opened);
        Ok(())
    }

    fn send(&mut self, payload: &str) -> Result<(), NetError> {
        let mut hub = self.hub.borrow_mut();
        let peer = hub.endpoints[self.id].peer.ok_or(NetError::NotConnected)?;
        hub.endpoints[peer]
            .inbox
            .push_back(TransportEvent::Data(payload.to_string()));
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.hub.borrow_mut().endpoints[self.id].inbox.pop_front()
    }

    fn close(&mut self) {
        let mut hub = self.hub.borrow_mut();
        if let Some(peer) = hub.endpoints[self.id].peer.take() {
            hub.endpoints[peer].peer = None;
            hub.endpoints[peer].inbox.push_back(TransportEvent::Closed);
        }
        if let Some(address) = hub.endpoints[self.id].listening_on.take() {
            hub.listeners.remove(&address);
        }
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_endpoints_exchange_payloads() {
        let network = LoopbackNetwork::new();
        let mut host = network.endpoint();
        let mut guest = network.endpoint();

        host.listen("pokemon-memory-room00001").expect("listen");
        guest.connect("pokemon-memory-room00001").expect("connect");
        assert_eq!(host.poll_event(), Some(TransportEvent::Opened));
        assert_eq!(guest.poll_event(), Some(TransportEvent::Opened));

        guest.send("hello").expect("send");
        assert_eq!(host.poll_event(), Some(TransportEvent::Data("hello".into())));
        assert_eq!(host.poll_event(), None);

        guest.close();
        assert_eq!(host.poll_event(), Some(TransportEvent::Closed));
        assert_eq!(host.send("anyone?"), Err(NetError::NotConnected));
    }

    #[test]
    fn unknown_and_full_rooms_are_refused() {
        let network = LoopbackNetwork::new();
        let mut host = network.endpoint();
        let mut guest = network.endpoint();
        let mut third = network.endpoint();

        assert!(matches!(
            guest.connect("pokemon-memory-nowhere00"),
            Err(NetError::RoomNotFound { .. })
        ));

        host.listen("pokemon-memory-room00002").expect("listen");
        guest.connect("pokemon-memory-room00002").expect("connect");
        assert!(matches!(
            third.connect("pokemon-memory-room00002"),
            Err(NetError::ConnectionError { .. })
        ));
    }

    #[test]
    fn dropped_host_frees_the_address() {
        let network = LoopbackNetwork::new();
        {
            let mut host = network.endpoint();
            host.listen("pokemon-memory-room00003").expect("listen");
        }
        let mut again = network.endpoint();
        again.listen("pokemon-memory-room00003").expect("address should be free");
    }
}
