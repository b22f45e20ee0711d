use log::{debug, info, warn};

use super::error::NetError;
use super::protocol::PeerMessage;
use super::room::RoomCode;
use super::transport::{ConnectionState, PeerTransport, TransportEvent};
use crate::game::PeerRole;

/// 连接层交给会话层的事件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Connected,
    Message(PeerMessage),
    Failed(NetError),
    Closed,
}

/// 一条对端连接：负责握手、超时与消息编解码，不碰游戏状态。
pub struct PeerSync<T: PeerTransport> {
    transport: T,
    role: PeerRole,
    room: RoomCode,
    state: ConnectionState,
    join_started_at: f64,
    join_deadline: Option<f64>,
}

impl<T: PeerTransport> PeerSync<T> {
    pub fn host(mut transport: T, room: RoomCode) -> Result<Self, NetError> {
        transport.listen(&room.address())?;
        info!("[PEER] Hosting room {}", room);
        Ok(Self {
            transport,
            role: PeerRole::Host,
            room,
            state: ConnectionState::Listening,
            join_started_at: 0.0,
            join_deadline: None,
        })
    }

    pub fn join(
        mut transport: T,
        room: RoomCode,
        now: f64,
        timeout_ms: u64,
    ) -> Result<Self, NetError> {
        transport.connect(&room.address())?;
        info!("[PEER] Joining room {}", room);
        Ok(Self {
            transport,
            role: PeerRole::Guest,
            room,
            state: ConnectionState::Connecting,
            join_started_at: now,
            join_deadline: Some(now + timeout_ms as f64),
        })
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// 等待中的加入超时时刻。
    pub fn deadline(&self) -> Option<f64> {
        self.join_deadline
    }

    pub fn poll(&mut self, now: f64) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.transport.poll_event() {
            match event {
                TransportEvent::Opened => {
                    if self.state == ConnectionState::Connected {
                        continue;
                    }
                    self.state = ConnectionState::Connected;
                    self.join_deadline = None;
                    info!("[PEER] Channel open in room {} as {:?}", self.room, self.role);
                    events.push(SyncEvent::Connected);
                }
                TransportEvent::Data(payload) => match PeerMessage::decode(&payload) {
                    Ok(message) => {
                        debug!("[PEER] <- {:?}", message);
                        events.push(SyncEvent::Message(message));
                    }
                    Err(error) => warn!("[PEER] Dropping malformed message: {}", error),
                },
                TransportEvent::Closed => {
                    self.state = ConnectionState::Closed;
                    self.join_deadline = None;
                    info!("[PEER] Channel closed");
                    events.push(SyncEvent::Closed);
                    break;
                }
                TransportEvent::Failed(error) => {
                    warn!("[PEER] Transport failure: {}", error);
                    self.state = ConnectionState::Closed;
                    self.join_deadline = None;
                    self.transport.close();
                    events.push(SyncEvent::Failed(error));
                    break;
                }
            }
        }

        if let Some(deadline) = self.join_deadline {
            if self.state == ConnectionState::Connecting && now >= deadline {
                let waited_ms = (now - self.join_started_at).max(0.0) as u64;
                warn!("[PEER] Join timed out after {} ms", waited_ms);
                self.state = ConnectionState::Closed;
                self.join_deadline = None;
                self.transport.close();
                events.push(SyncEvent::Failed(NetError::ConnectionTimeout { waited_ms }));
            }
        }
        events
    }

    pub fn send(&mut self, message: &PeerMessage) -> Result<(), NetError> {
        if !self.is_connected() {
            return Err(NetError::NotConnected);
        }
        let payload = message.encode().map_err(NetError::connection)?;
        debug!("[PEER] -> {}", payload);
        self.transport.send(&payload)
    }

    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Closed {
            info!("[PEER] Leaving room {}", self.room);
        }
        self.transport.close();
        self.state = ConnectionState::Closed;
        self.join_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PlayerSlot;
    use crate::net::loopback::{LoopbackNetwork, LoopbackTransport};
    use crate::net::transport::PeerTransport;

    fn room() -> RoomCode {
        RoomCode::parse("abc123xyz").expect("valid code")
    }

    fn pair(network: &LoopbackNetwork) -> (PeerSync<LoopbackTransport>, PeerSync<LoopbackTransport>) {
        let host = PeerSync::host(network.endpoint(), room()).expect("host");
        let guest = PeerSync::join(network.endpoint(), room(), 0.0, 12_000).expect("join");
        (host, guest)
    }

    #[test]
    fn both_sides_see_connected_then_messages() {
        let network = LoopbackNetwork::new();
        let (mut host, mut guest) = pair(&network);

        assert_eq!(host.poll(1.0), vec![SyncEvent::Connected]);
        assert_eq!(guest.poll(1.0), vec![SyncEvent::Connected]);
        assert_eq!(guest.role(), PeerRole::Guest);

        let turn = PeerMessage::TurnChange {
            current_player: PlayerSlot::Two,
        };
        host.send(&turn).expect("send");
        assert_eq!(guest.poll(2.0), vec![SyncEvent::Message(turn)]);
    }

    #[test]
    fn send_before_open_is_refused() {
        let network = LoopbackNetwork::new();
        let mut host = PeerSync::host(network.endpoint(), room()).expect("host");
        assert_eq!(
            host.send(&PeerMessage::CardFlip { index: 0 }),
            Err(NetError::NotConnected)
        );
    }

    #[test]
    fn join_times_out_when_channel_never_opens() {
        let network = LoopbackNetwork::new();
        network.set_stalled(true);
        let _host = PeerSync::host(network.endpoint(), room()).expect("host");
        let mut guest = PeerSync::join(network.endpoint(), room(), 100.0, 12_000).expect("join");

        assert!(guest.poll(5_000.0).is_empty());
        assert_eq!(
            guest.poll(12_100.0),
            vec![SyncEvent::Failed(NetError::ConnectionTimeout { waited_ms: 12_000 })]
        );
        assert_eq!(guest.state(), ConnectionState::Closed);
        assert!(guest.poll(20_000.0).is_empty(), "timeout fires once");
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let network = LoopbackNetwork::new();
        let (mut host, mut guest) = pair(&network);
        host.poll(0.0);
        guest.poll(0.0);

        host.transport.send("garbage").expect("raw send");
        host.transport.send("{\"type\":\"NOPE\"}").expect("raw send");
        host.send(&PeerMessage::CardFlip { index: 3 }).expect("send");
        assert_eq!(
            guest.poll(1.0),
            vec![SyncEvent::Message(PeerMessage::CardFlip { index: 3 })]
        );
    }

    #[test]
    fn remote_close_is_reported() {
        let network = LoopbackNetwork::new();
        let (mut host, mut guest) = pair(&network);
        host.poll(0.0);
        guest.poll(0.0);

        guest.disconnect();
        assert_eq!(host.poll(1.0), vec![SyncEvent::Closed]);
        assert!(!host.is_connected());
    }
}
