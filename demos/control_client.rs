//! Example control client
//!
//! This demonstrates how a deck front-end talks to a running deck-agent:
//! list the command catalog, run a single action, then run a macro.
//!
//! Run with: cargo run --example control_client -- [host:port]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5445".to_string());
    println!("Connecting to {}", addr);

    let mut stream = TcpStream::connect(&addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(30)))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    println!("Connected!");

    // Example 1: List the command catalog
    println!("\n--- Listing commands ---");
    writeln!(stream, "GET_COMMANDS")?;
    let response = read_response(&mut reader)?;
    match response.strip_prefix("COMMAND_LIST:") {
        Some(json) => {
            let commands: serde_json::Value = serde_json::from_str(json)?;
            println!("{}", serde_json::to_string_pretty(&commands)?);
        }
        None => println!("Response: {}", response),
    }

    // Example 2: Run a single action
    println!("\n--- Toggling mute ---");
    writeln!(stream, "ToggleMute Mic/Aux")?;
    println!("Response: {}", read_response(&mut reader)?);

    // Example 3: Run a macro; one line for the acknowledgment plus one per step
    println!("\n--- Running MyMacro ---");
    writeln!(stream, "MACRO:MyMacro")?;
    for _ in 0..5 {
        println!("Response: {}", read_response(&mut reader)?);
    }

    println!("\nDone!");
    Ok(())
}

fn read_response(reader: &mut impl BufRead) -> std::io::Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}
