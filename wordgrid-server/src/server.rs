use crate::game_manager::GameManager;
use log::*;
use std::{
    collections::HashMap,
    fmt::Debug,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
};
use thiserror::Error;
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream, tcp::OwnedReadHalf},
    select,
    sync::mpsc::{self, error::TrySendError},
    task::{self, JoinHandle},
    time::{Duration, Instant, sleep_until, timeout},
};
use wordgrid_common::{
    messages::{ClientEvent, ServerEvent},
    timing,
};

const TIMEOUT: Duration = Duration::from_millis(500);
const WORKER_CHANNEL_LEN: usize = 4;

/// Handle to the running event server. Owns the listener and server
/// tasks; dropping it stops both.
#[derive(Debug)]
pub struct GameServer {
    tx: mpsc::Sender<ServerMessage>,
    server_join: JoinHandle<()>,
    listener_join: JoinHandle<()>,
}

impl GameServer {
    pub fn new(manager: GameManager, port: u16) -> Self {
        let (tx, rx) = mpsc::channel(8);

        let server_join = task::spawn(Server::new(rx, tx.clone(), manager).run_loop());

        let listener_join = task::spawn(listener_loop(tx.clone(), port));

        Self {
            tx,
            server_join,
            listener_join,
        }
    }
}

impl Drop for GameServer {
    fn drop(&mut self) {
        if self.tx.try_send(ServerMessage::Stop).is_err() {
            self.server_join.abort();
        }
        self.listener_join.abort();
    }
}

#[derive(Debug, Error)]
enum WorkerError {
    #[error("The sender closed the channel")]
    ChannelClosed,
    #[error(transparent)]
    IoError(#[from] io::Error),
}

async fn worker_loop<T: AsyncWrite + Debug + Unpin + Send>(
    mut rx: mpsc::Receiver<Vec<u8>>,
    mut write: T,
) -> Result<(), WorkerError> {
    loop {
        let data = rx.recv().await.ok_or(WorkerError::ChannelClosed)?;

        match timeout(TIMEOUT, write.write_all(&data[..])).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Send to {:?} failed: {e:?}", write);
                Err(e)?;
            }
            Err(_) => {
                warn!("Send to {:?} timed out", write);
            }
        }
    }
}

async fn reader_loop(id: usize, read: OwnedReadHalf, tx: mpsc::Sender<ServerMessage>) {
    let mut lines = BufReader::new(read).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<ClientEvent>(&line) {
                Ok(event) => {
                    if tx.send(ServerMessage::ClientEvent(id, event)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!("Connection {id} sent an unparseable event: {e}");
                    break;
                }
            },
            Ok(None) => {
                debug!("Connection {id} reached EOF");
                break;
            }
            Err(e) => {
                info!("Read from connection {id} failed: {e:?}");
                break;
            }
        }
    }

    let _ = tx.send(ServerMessage::ConnectionClosed(id)).await;
}

#[derive(Debug)]
pub enum ServerMessage {
    NewConnection(TcpStream, SocketAddr),
    ClientEvent(usize, ClientEvent),
    ConnectionClosed(usize),
    Stop,
}

#[derive(Debug)]
struct ClientHandle {
    tx: mpsc::Sender<Vec<u8>>,
    writer_join: JoinHandle<Result<(), WorkerError>>,
    reader_join: JoinHandle<()>,
    player: String,
    room: Option<String>,
}

impl ClientHandle {
    fn send_event(&self, event: &ServerEvent) -> Result<(), TrySendError<Vec<u8>>> {
        let frame = (serde_json::to_string(event).unwrap() + "\n").into_bytes();
        self.tx.try_send(frame)
    }

    fn is_in_room(&self, room: &str) -> bool {
        self.room.as_deref() == Some(room)
    }
}

#[derive(Debug)]
struct Server {
    next_id: usize,
    clients: HashMap<usize, ClientHandle>,
    manager: GameManager,
    rx: mpsc::Receiver<ServerMessage>,
    tx: mpsc::Sender<ServerMessage>,
}

impl Server {
    fn new(
        rx: mpsc::Receiver<ServerMessage>,
        tx: mpsc::Sender<ServerMessage>,
        manager: GameManager,
    ) -> Self {
        Self {
            next_id: 0,
            clients: HashMap::new(),
            manager,
            rx,
            tx,
        }
    }

    async fn run_loop(mut self) {
        loop {
            let expiry = match self.next_expiry_instant() {
                Some(instant) => ExpiryWakeup::At(Box::pin(sleep_until(instant))),
                None => ExpiryWakeup::Never(core::future::pending()),
            };

            select! {
                _ = expiry => {
                    self.announce_expired_games();
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(ServerMessage::NewConnection(stream, addr)) => {
                            self.add_client(stream, addr);
                        }
                        Some(ServerMessage::ClientEvent(id, event)) => {
                            self.handle_event(id, event);
                        }
                        Some(ServerMessage::ConnectionClosed(id)) => {
                            self.remove_client(id);
                        }
                        Some(ServerMessage::Stop) | None => {
                            break;
                        }
                    }
                }
            }
        }
    }

    fn add_client(&mut self, stream: TcpStream, addr: SocketAddr) {
        let id = self.next_id;
        self.next_id += 1;

        let (read, write) = stream.into_split();
        let (tx, rx) = mpsc::channel(WORKER_CHANNEL_LEN);
        let writer_join = task::spawn(worker_loop(rx, write));
        let reader_join = task::spawn(reader_loop(id, read, self.tx.clone()));

        self.clients.insert(
            id,
            ClientHandle {
                tx,
                writer_join,
                reader_join,
                // Players are identified by source address, so two
                // connections from one host share their guesses
                player: addr.ip().to_string(),
                room: None,
            },
        );
    }

    fn remove_client(&mut self, id: usize) {
        if let Some(handle) = self.clients.remove(&id) {
            debug!("Removing connection {id} (player {})", handle.player);
            handle.writer_join.abort();
            handle.reader_join.abort();
        }
    }

    fn send_to(&mut self, id: usize, event: &ServerEvent) {
        if let Some(handle) = self.clients.get(&id) {
            if let Err(e) = handle.send_event(event) {
                if matches!(e, TrySendError::Closed(_)) {
                    info!("Worker channel for connection {id} closed");
                    self.remove_client(id);
                } else {
                    error!("Error sending to connection {id}: {e:?}");
                }
            }
        }
    }

    fn broadcast_to_room(&mut self, room: &str, event: &ServerEvent) {
        let ids: Vec<usize> = self
            .clients
            .iter()
            .filter(|(_, handle)| handle.is_in_room(room))
            .map(|(&id, _)| id)
            .collect();
        for id in ids {
            self.send_to(id, event);
        }
    }

    fn handle_event(&mut self, id: usize, event: ClientEvent) {
        let now = timing::now_millis();
        match event {
            ClientEvent::Join { room } => self.handle_join(id, room),
            ClientEvent::Guess { room, guess } => self.handle_guess(id, room, guess, now),
            ClientEvent::NewGame { room } => self.handle_new_game(room, now),
            ClientEvent::TimerExpired { room } => self.handle_timer_expired(room, now),
        }
    }

    fn handle_join(&mut self, id: usize, room: String) {
        let Some(player) = self.clients.get(&id).map(|c| c.player.clone()) else {
            return;
        };

        let (refresh, snapshot) = match self.manager.game(&room) {
            Some(game) => (
                ServerEvent::ValidGuessesRefresh {
                    guesses: game.player_guesses(&player),
                },
                ServerEvent::GameState(game.snapshot(Some(&player))),
            ),
            None => {
                warn!("Player {player} has joined invalid room {room}");
                return;
            }
        };

        info!("Player {player} has joined room {room}");
        if let Some(handle) = self.clients.get_mut(&id) {
            handle.room = Some(room);
        }
        self.send_to(id, &refresh);
        self.send_to(id, &snapshot);
    }

    fn handle_guess(&mut self, id: usize, room: String, guess: String, now: u64) {
        let Some(player) = self.clients.get(&id).map(|c| c.player.clone()) else {
            return;
        };
        info!("Received guess from {player}: {guess}");

        let valid = match self.manager.game_mut(&room) {
            Some(game) => game.guess_word(&player, &guess, now),
            None => {
                warn!("Player {player} guessed in invalid room {room}");
                return;
            }
        };

        self.send_to(id, &ServerEvent::GuessReply { valid, guess });
    }

    fn handle_new_game(&mut self, room: String, now: u64) {
        debug!("Received new_game for room {room}");

        self.manager.create_game_for_room(&room, now);
        self.broadcast_to_room(&room, &ServerEvent::ReloadPage);
    }

    fn handle_timer_expired(&mut self, room: String, now: u64) {
        debug!("Received timer_expired for room {room}");

        // Clients only project the countdown; the deadline here is the
        // authority
        let expired = match self.manager.game(&room) {
            Some(game) => !game.running(now),
            None => {
                warn!("Timer expired for invalid room {room}");
                return;
            }
        };

        if expired {
            self.announce_game_over(&room);
        }
    }

    /// Sends each member of the room their own score report, at most
    /// once per game instance.
    fn announce_game_over(&mut self, room: &str) {
        let members: Vec<(usize, String)> = self
            .clients
            .iter()
            .filter(|(_, handle)| handle.is_in_room(room))
            .map(|(&id, handle)| (id, handle.player.clone()))
            .collect();

        let reports: Vec<(usize, ServerEvent)> = {
            let Some(game) = self.manager.game_mut(room) else {
                return;
            };
            if game.game_over_announced() {
                return;
            }
            game.set_game_over_announced();
            info!(
                "[{room}] Game over, announcing to {} connection(s)",
                members.len()
            );

            members
                .into_iter()
                .map(|(id, player)| (id, ServerEvent::GameOver(game.score_report(&player))))
                .collect()
        };

        for (id, event) in reports {
            self.send_to(id, &event);
        }
    }

    fn announce_expired_games(&mut self) {
        for room in self.manager.expired_rooms(timing::now_millis()) {
            self.announce_game_over(&room);
        }
    }

    fn next_expiry_instant(&self) -> Option<Instant> {
        let expire = self.manager.next_expiry()?;
        let remaining = timing::millis_remaining(expire, timing::now_millis());
        Some(Instant::now() + Duration::from_millis(remaining))
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        for (_, handle) in self.clients.iter() {
            handle.writer_join.abort();
            handle.reader_join.abort();
        }
    }
}

async fn listener_loop(tx: mpsc::Sender<ServerMessage>, port: u16) {
    info!("Starting listener on port {port}");
    let listener_v6 = match TcpListener::bind(("::", port)).await {
        Ok(listener) => Some(listener),
        Err(e) => {
            error!("Failed to bind to port {port} on IPv6: {e:?}");
            None
        }
    };

    // On some OSs, we must separately listen on IPv4, but on other OSs
    // that isn't allowed, so we just try to listen on IPv4
    let listener_v4 = TcpListener::bind(("0.0.0.0", port)).await.ok();

    info!("Listener started");

    loop {
        type ListenResult = std::io::Result<(TcpStream, SocketAddr)>;

        fn create_future<'a>(
            listener: Option<&'a TcpListener>,
        ) -> Pin<Box<dyn Future<Output = ListenResult> + Send + 'a>> {
            if let Some(listener) = listener {
                Box::pin(listener.accept())
            } else {
                Box::pin(core::future::pending())
            }
        }

        let v6_future = create_future(listener_v6.as_ref());
        let v4_future = create_future(listener_v4.as_ref());

        let handle_connection = async |conn: ListenResult| match conn {
            Ok((stream, addr)) => {
                info!("New connection from {addr:?}");
                tx.send(ServerMessage::NewConnection(stream, addr))
                    .await
                    .unwrap();
            }
            Err(e) => error!("Incoming connection failed: {e:?}"),
        };

        select! {
            conn = v4_future => handle_connection(conn),
            conn = v6_future => handle_connection(conn),
        }
        .await;
    }
}

enum ExpiryWakeup {
    Never(core::future::Pending<()>),
    At(Pin<Box<tokio::time::Sleep>>),
}

impl Future for ExpiryWakeup {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match *self {
            Self::Never(ref mut pend) => Pin::new(pend).poll(cx),
            Self::At(ref mut slp) => slp.as_mut().poll(cx),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{dictionary::WordList, game_manager::GameManager};
    use more_asserts::*;
    use std::io::ErrorKind;
    use std::sync::Once;
    use tokio::{
        io::{BufReader, Lines},
        net::tcp::OwnedWriteHalf,
    };
    use wordgrid_common::{config::Game as GameConfig, game_snapshot::GameSnapshot};

    const ROUND_TRIP_PORT: u16 = 12845;
    const EXPIRY_PORT: u16 = 12846;
    const MAX_CONN_FAILS: usize = 20;

    static INIT: Once = Once::new();

    fn initialize() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }

    fn test_manager(game_duration_secs: u16) -> GameManager {
        let config = GameConfig {
            game_duration_secs,
            ..Default::default()
        };
        let mut manager = GameManager::new(
            WordList::from_words(&["set", "states", "bat"]),
            config,
        );
        #[rustfmt::skip]
        let tiles = vec![
            's', 'a', 'b', 'e', 'r',
            'j', 't', 't', 's', 'x',
            'z', 'z', 'z', 'z', 'z',
            's', 'z', 'z', 'z', 'z',
            'z', 'z', 'z', 'z', 'z',
        ];
        manager.create_game_with_tiles("test", tiles, timing::now_millis());
        manager
    }

    async fn connect(port: u16) -> (Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
        let mut fail_count = 0;
        let stream = loop {
            match TcpStream::connect(("localhost", port)).await {
                Ok(stream) => break stream,
                Err(e) => {
                    if e.kind() == ErrorKind::ConnectionRefused {
                        assert_le!(fail_count, MAX_CONN_FAILS);
                        fail_count += 1;
                    } else {
                        panic!("Unexpected connection error: {e:?}");
                    }
                }
            }
        };
        let (read, write) = stream.into_split();
        (BufReader::new(read).lines(), write)
    }

    async fn send(write: &mut OwnedWriteHalf, event: &ClientEvent) {
        let frame = serde_json::to_string(event).unwrap() + "\n";
        write.write_all(frame.as_bytes()).await.unwrap();
    }

    async fn recv(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> ServerEvent {
        let line = lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_join_and_guess_round_trip() {
        initialize();
        let start = timing::now_millis();
        let _server = GameServer::new(test_manager(180), ROUND_TRIP_PORT);

        let (mut lines, mut write) = connect(ROUND_TRIP_PORT).await;

        send(
            &mut write,
            &ClientEvent::Join {
                room: "test".to_string(),
            },
        )
        .await;

        assert_eq!(
            recv(&mut lines).await,
            ServerEvent::ValidGuessesRefresh { guesses: vec![] }
        );

        let snapshot = match recv(&mut lines).await {
            ServerEvent::GameState(snapshot) => snapshot,
            other => panic!("Expected a game_state event, got {other:?}"),
        };
        assert_eq!(snapshot.tiles.len(), 25);
        assert_eq!(snapshot.tiles[0], "s");
        assert_ge!(snapshot.expire_time, start + 180_000);
        assert!(snapshot.player_guesses.is_empty());

        // A valid guess is accepted once and rejected when repeated
        send(
            &mut write,
            &ClientEvent::Guess {
                room: "test".to_string(),
                guess: "set".to_string(),
            },
        )
        .await;
        assert_eq!(
            recv(&mut lines).await,
            ServerEvent::GuessReply {
                valid: true,
                guess: "set".to_string()
            }
        );

        send(
            &mut write,
            &ClientEvent::Guess {
                room: "test".to_string(),
                guess: "set".to_string(),
            },
        )
        .await;
        assert_eq!(
            recv(&mut lines).await,
            ServerEvent::GuessReply {
                valid: false,
                guess: "set".to_string()
            }
        );

        // Not a recognized word
        send(
            &mut write,
            &ClientEvent::Guess {
                room: "test".to_string(),
                guess: "zzz".to_string(),
            },
        )
        .await;
        assert_eq!(
            recv(&mut lines).await,
            ServerEvent::GuessReply {
                valid: false,
                guess: "zzz".to_string()
            }
        );

        // timer_expired while the clock is still running must announce
        // nothing; the next reply we see is for the following event
        send(
            &mut write,
            &ClientEvent::TimerExpired {
                room: "test".to_string(),
            },
        )
        .await;
        send(
            &mut write,
            &ClientEvent::NewGame {
                room: "test".to_string(),
            },
        )
        .await;
        assert_eq!(recv(&mut lines).await, ServerEvent::ReloadPage);

        // Rejoining after the reset gives a fresh snapshot
        send(
            &mut write,
            &ClientEvent::Join {
                room: "test".to_string(),
            },
        )
        .await;
        assert_eq!(
            recv(&mut lines).await,
            ServerEvent::ValidGuessesRefresh { guesses: vec![] }
        );
        let snapshot: GameSnapshot = match recv(&mut lines).await {
            ServerEvent::GameState(snapshot) => snapshot,
            other => panic!("Expected a game_state event, got {other:?}"),
        };
        assert_eq!(snapshot.tiles.len(), 25);
    }

    #[tokio::test]
    async fn test_game_over_announced_once() {
        initialize();
        let _server = GameServer::new(test_manager(2), EXPIRY_PORT);

        let (mut lines, mut write) = connect(EXPIRY_PORT).await;

        send(
            &mut write,
            &ClientEvent::Join {
                room: "test".to_string(),
            },
        )
        .await;
        assert_eq!(
            recv(&mut lines).await,
            ServerEvent::ValidGuessesRefresh { guesses: vec![] }
        );
        let ServerEvent::GameState(_) = recv(&mut lines).await else {
            panic!("Expected a game_state event");
        };

        send(
            &mut write,
            &ClientEvent::Guess {
                room: "test".to_string(),
                guess: "set".to_string(),
            },
        )
        .await;
        assert_eq!(
            recv(&mut lines).await,
            ServerEvent::GuessReply {
                valid: true,
                guess: "set".to_string()
            }
        );

        // The server's own deadline wakeup announces the game over
        let report = match recv(&mut lines).await {
            ServerEvent::GameOver(report) => report,
            other => panic!("Expected a game_over event, got {other:?}"),
        };
        assert_eq!(report.scored_words, vec!["set"]);
        assert!(report.unscored_words.is_empty());

        // Guesses after expiry are always rejected
        send(
            &mut write,
            &ClientEvent::Guess {
                room: "test".to_string(),
                guess: "bat".to_string(),
            },
        )
        .await;
        assert_eq!(
            recv(&mut lines).await,
            ServerEvent::GuessReply {
                valid: false,
                guess: "bat".to_string()
            }
        );

        // A late timer_expired must not produce a second game_over; the
        // next event we see is the new_game broadcast
        send(
            &mut write,
            &ClientEvent::TimerExpired {
                room: "test".to_string(),
            },
        )
        .await;
        send(
            &mut write,
            &ClientEvent::NewGame {
                room: "test".to_string(),
            },
        )
        .await;
        assert_eq!(recv(&mut lines).await, ServerEvent::ReloadPage);
    }
}
