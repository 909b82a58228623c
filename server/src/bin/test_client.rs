use futures_util::{SinkExt, StreamExt};
use shared::{decode_binary, encode, ClientMessage, EncodedFrame, InputState, ServerMessage, WireFormat};
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

fn to_frame(message: &ClientMessage) -> Result<Message, Box<dyn std::error::Error>> {
    Ok(match encode(message, WireFormat::Bincode)? {
        EncodedFrame::Text(text) => Message::Text(text),
        EncodedFrame::Binary(bytes) => Message::Binary(bytes),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Server address, overridable by the first argument
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:3000".to_string());

    println!("Connecting to {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    // Talk bincode so the server answers in binary frames
    let create = ClientMessage::CreateRoom {
        preferred_profile: Some(0),
        custom_name: Some("Test Client".to_string()),
        tether_length: None,
        level_file: None,
    };
    println!("Sending create-room");
    write.send(to_frame(&create)?).await?;

    let mut updates = 0;
    let mut step = 0u32;
    while let Some(frame) = read.next().await {
        let message: ServerMessage = match frame? {
            Message::Binary(bytes) => decode_binary(&bytes)?,
            Message::Text(text) => shared::decode_text(&text)?,
            Message::Close(_) => break,
            _ => continue,
        };

        match message {
            ServerMessage::Welcome { id, limits } => {
                println!("Welcome, client {} (tether limits {:?})", id, limits);
            }
            ServerMessage::RoomJoined(payload) => {
                println!(
                    "Joined room {} in slot {:?} on level {:?} ({}x{} tiles)",
                    payload.room_code,
                    payload.slot,
                    payload.world.name,
                    payload.world.columns,
                    payload.world.rows
                );
            }
            ServerMessage::State(snapshot) => {
                updates += 1;
                if updates % 30 != 0 {
                    continue;
                }
                println!(
                    "Room {} [{:?}] server time {}, {} spectators",
                    snapshot.room_code, snapshot.status, snapshot.server_time, snapshot.spectators
                );
                for player in &snapshot.players {
                    println!(
                        "  Player {} ({}): pos=({}, {}) vel=({}, {})",
                        player.id, player.name, player.x, player.y, player.vx, player.vy
                    );
                }

                // Walk right, then left, hopping now and then
                step += 1;
                let input = InputState {
                    left: step % 4 >= 2,
                    right: step % 4 < 2,
                    jump: step % 3 == 0,
                };
                write.send(to_frame(&ClientMessage::Input(input))?).await?;

                if updates >= 600 {
                    break;
                }
            }
            other => println!("Received: {:?}", other),
        }
    }

    println!("Sending leave-room");
    write.send(to_frame(&ClientMessage::LeaveRoom)?).await?;
    sleep(Duration::from_millis(100)).await;
    write.close().await?;

    println!("Test client finished");
    Ok(())
}
