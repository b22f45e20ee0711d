use gloo_timers::future::TimeoutFuture;
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::js_sys::{Function, Reflect, JSON};

use crate::net::{NetError, PeerTransport, TransportEvent};

#[wasm_bindgen]
extern "C" {
    /// PeerJS 的 `Peer`，页面需先加载 peerjs 脚本。
    #[derive(Clone, Debug)]
    type Peer;

    #[wasm_bindgen(catch, constructor)]
    fn new(id: &JsValue) -> Result<Peer, JsValue>;

    #[wasm_bindgen(method)]
    fn on(this: &Peer, event: &str, callback: &Function);

    #[wasm_bindgen(method, catch)]
    fn connect(this: &Peer, id: &str) -> Result<DataConnection, JsValue>;

    #[wasm_bindgen(method)]
    fn destroy(this: &Peer);
}

#[wasm_bindgen]
extern "C" {
    #[derive(Clone, Debug)]
    type DataConnection;

    #[wasm_bindgen(method, js_name = on)]
    fn on(this: &DataConnection, event: &str, callback: &Function);

    #[wasm_bindgen(method, catch)]
    fn send(this: &DataConnection, data: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method)]
    fn close(this: &DataConnection);
}

type Callback = Closure<dyn FnMut(JsValue)>;

/// 关闭后回调还要再活一段时间，PeerJS 可能在 `destroy` 之后才派发事件。
const RETIRE_CALLBACKS_MS: u32 = 5_000;

/// 回调与传输共享的状态。任何借用都不能跨过对 PeerJS 的调用，
/// 因为 `close`、`send` 可能同步触发事件回调。
struct Shared<C = DataConnection> {
    events: RefCell<VecDeque<TransportEvent>>,
    connection: RefCell<Option<C>>,
    callbacks: RefCell<Vec<Callback>>,
}

impl<C> Default for Shared<C> {
    fn default() -> Self {
        Self {
            events: RefCell::new(VecDeque::new()),
            connection: RefCell::new(None),
            callbacks: RefCell::new(Vec::new()),
        }
    }
}

impl<C: Clone> Shared<C> {
    fn push(&self, event: TransportEvent) {
        self.events.borrow_mut().push_back(event);
    }

    fn attach(&self, connection: C) {
        *self.connection.borrow_mut() = Some(connection);
    }

    fn is_attached(&self) -> bool {
        self.connection.borrow().is_some()
    }

    fn current(&self) -> Option<C> {
        self.connection.borrow().clone()
    }

    /// 先取出连接再挂断，挂断时同步到来的 `close` 事件可以再次借用。
    fn hang_up(&self, close: impl FnOnce(C)) {
        let connection = self.connection.borrow_mut().take();
        if let Some(connection) = connection {
            close(connection);
        }
    }

    fn connection_closed(&self) {
        let connection = self.connection.borrow_mut().take();
        if connection.is_some() {
            debug!("[PEER] Data channel closed");
        }
        self.push(TransportEvent::Closed);
    }

    fn retire_callbacks(&self) -> Vec<Callback> {
        self.callbacks.take()
    }
}

/// 基于 PeerJS 的传输。回调只往队列里放事件，由会话层轮询取走。
pub struct PeerJsTransport {
    shared: Rc<Shared>,
    peer: Option<Peer>,
}

impl PeerJsTransport {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared::default()),
            peer: None,
        }
    }

    fn open_peer(&mut self, id: &JsValue, address: &str) -> Result<Peer, NetError> {
        let peer = Peer::new(id).map_err(|error| NetError::connection(describe(&error)))?;
        let room = address.to_string();
        listen(&self.shared, &peer, "error", move |shared, error| {
            let failure = classify(&error, &room);
            warn!("[PEER] PeerJS error: {}", failure);
            shared.push(TransportEvent::Failed(failure));
        });
        self.peer = Some(peer.clone());
        Ok(peer)
    }
}

impl Default for PeerJsTransport {
    fn default() -> Self {
        PeerJsTransport::new()
    }
}

impl PeerTransport for PeerJsTransport {
    fn listen(&mut self, address: &str) -> Result<(), NetError> {
        let peer = self.open_peer(&JsValue::from_str(address), address)?;
        listen(&self.shared, &peer, "connection", |shared, value| {
            let connection: DataConnection = value.unchecked_into();
            if shared.is_attached() {
                info!("[PEER] Refusing a third player");
                connection.close();
                return;
            }
            wire_connection(shared, &connection);
        });
        Ok(())
    }

    fn connect(&mut self, address: &str) -> Result<(), NetError> {
        let peer = self.open_peer(&JsValue::UNDEFINED, address)?;
        let host = address.to_string();
        let opener = peer.clone();
        listen(&self.shared, &peer, "open", move |shared, _| {
            match opener.connect(&host) {
                Ok(connection) => wire_connection(shared, &connection),
                Err(error) => shared.push(TransportEvent::Failed(NetError::connection(
                    describe(&error),
                ))),
            }
        });
        Ok(())
    }

    fn send(&mut self, payload: &str) -> Result<(), NetError> {
        let connection = self.shared.current().ok_or(NetError::NotConnected)?;
        connection
            .send(&JsValue::from_str(payload))
            .map_err(|error| NetError::connection(describe(&error)))
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.shared.events.borrow_mut().pop_front()
    }

    fn close(&mut self) {
        self.shared.hang_up(|connection| connection.close());
        if let Some(peer) = self.peer.take() {
            peer.destroy();
        }
        let retired = self.shared.retire_callbacks();
        if retired.is_empty() {
            return;
        }
        spawn_local(async move {
            TimeoutFuture::new(RETIRE_CALLBACKS_MS).await;
            drop(retired);
        });
    }
}

impl Drop for PeerJsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

trait EventSource {
    fn subscribe(&self, event: &str, callback: &Function);
}

impl EventSource for Peer {
    fn subscribe(&self, event: &str, callback: &Function) {
        self.on(event, callback);
    }
}

impl EventSource for DataConnection {
    fn subscribe(&self, event: &str, callback: &Function) {
        self.on(event, callback);
    }
}

/// 注册回调并把闭包保存在 `Shared` 中；闭包只持有弱引用。
fn listen<S, F>(shared: &Rc<Shared>, source: &S, event: &str, mut handler: F)
where
    S: EventSource,
    F: FnMut(&Rc<Shared>, JsValue) + 'static,
{
    let weak = Rc::downgrade(shared);
    let callback: Callback = Closure::wrap(Box::new(move |value: JsValue| {
        if let Some(shared) = weak.upgrade() {
            handler(&shared, value);
        }
    }) as Box<dyn FnMut(JsValue)>);
    source.subscribe(event, callback.as_ref().unchecked_ref());
    shared.callbacks.borrow_mut().push(callback);
}

fn wire_connection(shared: &Rc<Shared>, connection: &DataConnection) {
    shared.attach(connection.clone());

    listen(shared, connection, "open", |shared, _| {
        shared.push(TransportEvent::Opened);
    });
    listen(shared, connection, "data", |shared, data| {
        let payload = match data.as_string() {
            Some(text) => text,
            None => match JSON::stringify(&data) {
                Ok(text) => String::from(text),
                Err(error) => {
                    warn!("[PEER] Unreadable payload: {}", describe(&error));
                    return;
                }
            },
        };
        shared.push(TransportEvent::Data(payload));
    });
    listen(shared, connection, "close", |shared, _| {
        shared.connection_closed();
    });
    listen(shared, connection, "error", |shared, error| {
        shared.push(TransportEvent::Failed(NetError::connection(describe(&error))));
    });
}

/// PeerJS 的错误带 `type` 字段，`peer-unavailable` 表示房间不存在。
fn classify(error: &JsValue, address: &str) -> NetError {
    let kind = Reflect::get(error, &JsValue::from_str("type"))
        .ok()
        .and_then(|value| value.as_string())
        .unwrap_or_default();
    match kind.as_str() {
        "peer-unavailable" => NetError::RoomNotFound {
            room: address.to_string(),
        },
        "unavailable-id" => NetError::connection("room code is already in use"),
        _ => NetError::connection(describe(error)),
    }
}

fn describe(error: &JsValue) -> String {
    Reflect::get(error, &JsValue::from_str("message"))
        .ok()
        .and_then(|value| value.as_string())
        .or_else(|| error.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Weak;

    /// 挂断时像 PeerJS 一样同步回调 `close` 处理器。
    #[derive(Clone)]
    struct EagerChannel {
        shared: Weak<Shared<EagerChannel>>,
    }

    impl EagerChannel {
        fn close(&self) {
            if let Some(shared) = self.shared.upgrade() {
                shared.connection_closed();
            }
        }
    }

    fn attached() -> Rc<Shared<EagerChannel>> {
        let shared = Rc::new(Shared::default());
        shared.attach(EagerChannel {
            shared: Rc::downgrade(&shared),
        });
        shared
    }

    #[test]
    fn hang_up_survives_a_synchronous_close_event() {
        let shared = attached();
        shared.hang_up(|channel| channel.close());

        assert!(!shared.is_attached());
        assert!(matches!(
            shared.events.borrow_mut().pop_front(),
            Some(TransportEvent::Closed)
        ));
    }

    #[test]
    fn close_event_can_fire_while_a_send_is_in_flight() {
        let shared = attached();
        let channel = shared.current().expect("attached channel");
        channel.close();

        assert!(shared.current().is_none());
        shared.hang_up(|_| panic!("nothing left to hang up"));
    }
}
