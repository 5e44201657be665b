use std::error::Error;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{self, AsyncBufReadExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let server_url = args.next().unwrap_or_else(|| "ws://127.0.0.1:4444".to_string());
    let topic = args.next().unwrap_or_else(|| "lobby".to_string());

    // 1. Connect to the signaling server
    let (ws_stream, _) = connect_async(server_url.as_str()).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    println!("Connected to {}", server_url);

    // 2. Join the topic
    let subscribe = json!({ "type": "subscribe", "topics": [topic] });
    ws_tx.send(Message::text(subscribe.to_string())).await?;
    println!("Subscribed to '{}'. Type a message and press Enter:", topic);

    // 3. Print everything relayed on the topic
    tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => print_relayed(&text),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Read error: {}", e);
                    break;
                }
            }
        }
        println!("Disconnected");
    });

    // 4. Publish stdin lines
    let mut stdin = io::BufReader::new(io::stdin()).lines();
    while let Ok(Some(line)) = stdin.next_line().await {
        let publish = json!({ "type": "publish", "topic": topic, "data": line });
        ws_tx.send(Message::text(publish.to_string())).await?;
    }

    ws_tx.send(Message::Close(None)).await?;
    Ok(())
}

fn print_relayed(text: &str) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        println!("\n> {}", text);
        return;
    };
    match value["type"].as_str() {
        Some("publish") => println!(
            "\n> [{} | {} clients] {}",
            value["topic"].as_str().unwrap_or("?"),
            value["clients"],
            value.get("data").unwrap_or(&Value::Null)
        ),
        Some("pong") => println!("\n> pong"),
        _ => println!("\n> {}", text),
    }
}
