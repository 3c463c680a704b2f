//! Manual protocol check: reports a few positions, toggles a door, and prints
//! whatever the server sends back.
//!
//! Usage: `probe [SERVER_ADDR] [DISPLAY_NAME]`

use shared::{decode, encode, DoorEvent, Message, PositionReport, Vec3, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

async fn send(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    message: &Message,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = encode(message)?;
    println!("Sending {}", String::from_utf8_lossy(&data));
    socket.send_to(&data, server_addr).await?;
    Ok(())
}

async fn print_replies(socket: &UdpSocket) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    while let Ok(result) = timeout(Duration::from_millis(300), socket.recv_from(&mut buf)).await {
        match result {
            Ok((len, addr)) => match decode(&buf[..len]) {
                Ok(Message::Players(snapshot)) => {
                    println!(
                        "Snapshot from {}: {} player(s), doors {:?}",
                        addr,
                        snapshot.players.len(),
                        snapshot.doors
                    );
                    for p in snapshot.players {
                        println!(
                            "  {} ({}, {}) at ({:.2}, {:.2}, {:.2})",
                            p.id, p.player, p.model, p.x, p.y, p.z
                        );
                    }
                }
                Ok(other) => println!("Received {:?}", other),
                Err(e) => println!("Failed to decode reply: {}", e),
            },
            Err(e) => {
                println!("Error receiving reply: {}", e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let server_addr: SocketAddr = args
        .next()
        .unwrap_or_else(|| "127.0.0.1:9999".to_string())
        .parse()?;
    let name = args.next().unwrap_or_else(|| "probe".to_string());

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Probe socket bound to {}", socket.local_addr()?);

    for i in 0..3 {
        let mut report = PositionReport::new(None, Vec3::new(i as f32, 0.0, 1.5));
        report.player = Some(name.clone());
        send(&socket, server_addr, &Message::Pos(report)).await?;
        print_replies(&socket).await;
        sleep(Duration::from_millis(200)).await;
    }

    for state in [true, false] {
        let toggle = Message::DoorToggle(DoorEvent { door_id: 1, state });
        send(&socket, server_addr, &toggle).await?;
        print_replies(&socket).await;
    }

    send(&socket, server_addr, &Message::RemovePlayer { player: name }).await?;
    println!("Probe finished");

    Ok(())
}
