use log::{debug, info};
use std::net::IpAddr;
use tokio::{
    io,
    io::AsyncWriteExt,
    net::{TcpStream, tcp::OwnedWriteHalf},
    time::{Duration, sleep},
};
use wordgrid_common::messages::ClientEvent;

/// Retries until the server accepts the connection.
pub async fn connect(addr: IpAddr, port: u16) -> TcpStream {
    info!("Attempting server connection!");
    loop {
        match TcpStream::connect((addr, port)).await {
            Ok(stream) => {
                info!("Connected to server!");
                return stream;
            }
            Err(e) => {
                debug!("Connection attempt failed: {e:?}");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

pub async fn send_event(write: &mut OwnedWriteHalf, event: &ClientEvent) -> io::Result<()> {
    let frame = serde_json::to_string(event).expect("Client events always serialize") + "\n";
    write.write_all(frame.as_bytes()).await
}
