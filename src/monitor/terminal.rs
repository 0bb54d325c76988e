use super::PollTask;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use url::Url;

/// Lines kept above the visible screen.
const SCROLLBACK: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum TerminalStatus {
    Connecting,
    Connected,
    /// Closed by the server, or failed with the given error.
    Disconnected(Option<String>),
}

impl TerminalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TerminalStatus::Connecting => "Connecting...",
            TerminalStatus::Connected => "Connected",
            TerminalStatus::Disconnected(_) => "Disconnected",
        }
    }
}

#[derive(Debug)]
enum RelayEvent {
    Opened,
    Output(Vec<u8>),
    Closed(Option<String>),
}

/// Interactive shell of a worker, relayed over a WebSocket.
///
/// Owns one socket task and one screen at a time. Reconnecting aborts the
/// socket task, throws the screen away and bumps the generation, events of
/// older generations are dropped by [`TerminalRelay::pump`].
pub struct TerminalRelay {
    url: Url,
    headers: Vec<(&'static str, String)>,
    status: TerminalStatus,
    generation: u64,
    parser: vt100::Parser,
    size: (u16, u16),
    input: Option<mpsc::UnboundedSender<Vec<u8>>>,
    events_tx: mpsc::UnboundedSender<(u64, RelayEvent)>,
    events_rx: mpsc::UnboundedReceiver<(u64, RelayEvent)>,
    task: Option<PollTask>,
}

impl std::fmt::Debug for TerminalRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalRelay")
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("generation", &self.generation)
            .field("size", &self.size)
            .finish()
    }
}

impl TerminalRelay {
    /// Creates the relay and starts connecting.
    pub fn connect(url: Url, headers: Vec<(&'static str, String)>, rows: u16, cols: u16) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let size = (rows.max(1), cols.max(1));
        let mut relay = Self {
            url,
            headers,
            status: TerminalStatus::Connecting,
            generation: 0,
            parser: vt100::Parser::new(size.0, size.1, SCROLLBACK),
            size,
            input: None,
            events_tx,
            events_rx,
            task: None,
        };
        relay.reconnect();
        relay
    }

    /// Tears down the socket and the screen and connects again.
    pub fn reconnect(&mut self) {
        self.teardown();
        self.generation += 1;
        self.parser = vt100::Parser::new(self.size.0, self.size.1, SCROLLBACK);
        self.status = TerminalStatus::Connecting;

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        self.input = Some(input_tx);

        let generation = self.generation;
        let events = self.events_tx.clone();
        let url = self.url.clone();
        let headers = self.headers.clone();
        self.task = Some(PollTask::once(async move {
            run_socket(url, headers, input_rx, events, generation).await;
        }));
    }

    /// Aborts the socket task, the relay stays usable for [`TerminalRelay::reconnect`].
    pub fn close(&mut self) {
        self.teardown();
        self.generation += 1;
        self.status = TerminalStatus::Disconnected(None);
    }

    fn teardown(&mut self) {
        self.input = None;
        self.task = None;
    }

    pub fn status(&self) -> &TerminalStatus {
        &self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a socket task is alive.
    pub fn is_live(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }

    /// Forwards `bytes` to the shell, only while connected.
    pub fn send(&self, bytes: Vec<u8>) -> bool {
        if self.status != TerminalStatus::Connected || bytes.is_empty() {
            return false;
        }
        self.input
            .as_ref()
            .is_some_and(|input| input.send(bytes).is_ok())
    }

    /// Forwards a key press, see [`key_to_bytes`].
    pub fn send_key(&self, key: KeyEvent) -> bool {
        match key_to_bytes(key) {
            Some(bytes) => self.send(bytes),
            None => false,
        }
    }

    /// Refits the screen to `rows` x `cols`, the socket is left alone.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        let size = (rows.max(1), cols.max(1));
        if size != self.size {
            self.size = size;
            self.parser.set_size(size.0, size.1);
        }
    }

    /// Applies the socket events of the current generation, returns whether
    /// anything changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok((generation, event)) = self.events_rx.try_recv() {
            if generation != self.generation {
                continue;
            }
            changed = true;
            match event {
                RelayEvent::Opened => self.status = TerminalStatus::Connected,
                RelayEvent::Output(bytes) => self.parser.process(&bytes),
                RelayEvent::Closed(reason) => {
                    self.status = TerminalStatus::Disconnected(reason);
                    self.teardown();
                }
            }
        }
        changed
    }
}

impl Drop for TerminalRelay {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run_socket(
    url: Url,
    headers: Vec<(&'static str, String)>,
    mut input: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedSender<(u64, RelayEvent)>,
    generation: u64,
) {
    let report = |event: RelayEvent| {
        let _ = events.send((generation, event));
    };

    let mut request = match url.as_str().into_client_request() {
        Ok(request) => request,
        Err(err) => {
            report(RelayEvent::Closed(Some(err.to_string())));
            return;
        }
    };
    for (name, value) in headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            request.headers_mut().insert(name, value);
        }
    }

    let stream = match tokio_tungstenite::connect_async(request).await {
        Ok((stream, _)) => stream,
        Err(err) => {
            tracing::warn!("exec socket to {} failed: {}", url.path(), err);
            report(RelayEvent::Closed(Some(err.to_string())));
            return;
        }
    };
    tracing::debug!("exec socket open: {}", url.path());
    report(RelayEvent::Opened);

    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Binary(bytes))) => report(RelayEvent::Output(bytes)),
                Some(Ok(Message::Text(text))) => report(RelayEvent::Output(text.into_bytes())),
                Some(Ok(Message::Close(_))) | None => {
                    report(RelayEvent::Closed(None));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    report(RelayEvent::Closed(Some(err.to_string())));
                    break;
                }
            },
            bytes = input.recv() => match bytes {
                Some(bytes) => {
                    let message = match String::from_utf8(bytes) {
                        Ok(text) => Message::Text(text),
                        Err(err) => Message::Binary(err.into_bytes()),
                    };
                    if let Err(err) = sink.send(message).await {
                        report(RelayEvent::Closed(Some(err.to_string())));
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
        }
    }
}

/// Bytes a terminal would send for `key`, `None` for keys without an encoding.
pub fn key_to_bytes(key: KeyEvent) -> Option<Vec<u8>> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    let mut bytes = match key.code {
        KeyCode::Char(c) if ctrl => match c.to_ascii_lowercase() {
            c @ 'a'..='z' => vec![c as u8 - b'a' + 1],
            '@' | ' ' => vec![0],
            '[' => vec![0x1b],
            '\\' => vec![0x1c],
            ']' => vec![0x1d],
            '^' => vec![0x1e],
            '_' => vec![0x1f],
            _ => return None,
        },
        KeyCode::Char(c) => c.to_string().into_bytes(),
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::F(n) => match n {
            1 => b"\x1bOP".to_vec(),
            2 => b"\x1bOQ".to_vec(),
            3 => b"\x1bOR".to_vec(),
            4 => b"\x1bOS".to_vec(),
            5 => b"\x1b[15~".to_vec(),
            6 => b"\x1b[17~".to_vec(),
            7 => b"\x1b[18~".to_vec(),
            8 => b"\x1b[19~".to_vec(),
            9 => b"\x1b[20~".to_vec(),
            10 => b"\x1b[21~".to_vec(),
            11 => b"\x1b[23~".to_vec(),
            12 => b"\x1b[24~".to_vec(),
            _ => return None,
        },
        _ => return None,
    };

    if alt {
        bytes.insert(0, 0x1b);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_encoding() {
        let none = KeyModifiers::NONE;
        assert_eq!(key_to_bytes(key(KeyCode::Char('l'), none)), Some(b"l".to_vec()));
        assert_eq!(
            key_to_bytes(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(vec![3])
        );
        assert_eq!(
            key_to_bytes(key(KeyCode::Char('b'), KeyModifiers::ALT)),
            Some(b"\x1bb".to_vec())
        );
        assert_eq!(key_to_bytes(key(KeyCode::Enter, none)), Some(b"\r".to_vec()));
        assert_eq!(key_to_bytes(key(KeyCode::Up, none)), Some(b"\x1b[A".to_vec()));
        assert_eq!(key_to_bytes(key(KeyCode::Char('é'), none)), Some("é".as_bytes().to_vec()));
        assert_eq!(key_to_bytes(key(KeyCode::CapsLock, none)), None);
    }

    /// Accepts sockets forever, greets each one and echoes what it receives.
    async fn echo_server() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let _ = ws.send(Message::Text("\x1b[1mroot@worker\x1b[0m$ ".into())).await;
                    while let Some(Ok(message)) = ws.next().await {
                        if message.is_text() || message.is_binary() {
                            let _ = ws.send(Message::Binary(message.into_data())).await;
                        }
                    }
                });
            }
        });
        Url::parse(&format!("ws://{}/api/v1/endpoints/e/workers/exec?worker_id=w", addr)).unwrap()
    }

    async fn pump_until(relay: &mut TerminalRelay, done: impl Fn(&TerminalRelay) -> bool) {
        for _ in 0..100 {
            relay.pump();
            if done(relay) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("relay never reached the expected state: {:?}", relay);
    }

    #[tokio::test]
    async fn test_relay_round_trip() {
        let url = echo_server().await;
        let mut relay = TerminalRelay::connect(url, vec![], 24, 80);
        assert_eq!(relay.status(), &TerminalStatus::Connecting);
        // nothing is forwarded before the socket is open
        assert!(!relay.send(b"ls".to_vec()));

        pump_until(&mut relay, |r| {
            r.status() == &TerminalStatus::Connected && r.screen().contents().contains("root@worker")
        })
        .await;
        // escape sequences are interpreted, not printed
        assert!(!relay.screen().contents().contains("[1m"));
        assert!(relay.screen().cell(0, 0).is_some_and(|cell| cell.bold()));

        assert!(relay.send_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE)));
        pump_until(&mut relay, |r| r.screen().contents().contains("$ x")).await;

        relay.resize(10, 40);
        assert_eq!(relay.screen().size(), (10, 40));
        assert_eq!(relay.status(), &TerminalStatus::Connected);
    }

    #[tokio::test]
    async fn test_reconnects_leave_one_socket() {
        let url = echo_server().await;
        let mut relay = TerminalRelay::connect(url, vec![], 24, 80);
        for _ in 0..5 {
            relay.reconnect();
        }
        assert_eq!(relay.generation(), 6);
        assert!(relay.is_live());

        pump_until(&mut relay, |r| r.status() == &TerminalStatus::Connected).await;
        pump_until(&mut relay, |r| r.screen().contents().contains("root@worker")).await;
        // only the greeting of the live socket reached the fresh screen
        assert_eq!(relay.screen().contents().matches("root@worker").count(), 1);

        relay.close();
        assert!(!relay.is_live());
        assert!(!relay.send(b"ls".to_vec()));
    }

    #[tokio::test]
    async fn test_connect_failure_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("ws://{}/exec", addr)).unwrap();
        let mut relay = TerminalRelay::connect(url, vec![], 24, 80);
        pump_until(&mut relay, |r| {
            matches!(r.status(), TerminalStatus::Disconnected(Some(_)))
        })
        .await;
        assert!(!relay.is_live());
    }
}
