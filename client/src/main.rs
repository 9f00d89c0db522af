use clap::Parser;
use client::network::GameClient;
use client::shell::{render, Command, HELP};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let client = GameClient::connect(&args.server).await?;
    println!("Connected to {}", client.server_addr());
    println!("{}", HELP);

    let (mut messages, mut requests) = client.spawn_listener();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            message = messages.recv() => match message {
                Some(message) => println!("{}", render(&message)),
                None => {
                    println!("Disconnected from server");
                    break;
                }
            },

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Help)) => println!("{}", HELP),
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Some(request) = command.to_message() {
                            requests.send(&request).await?;
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            },
        }
    }

    info!("Client exiting");
    Ok(())
}
