//! odb: interactive shell for the ODB daemon.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use odb::config::{CLIENT_VERSION, DEFAULT_SOCKET_PATH};
use odb::service::shell::{execute, parse_line, Command, HELP_TEXT, PROMPT};
use odb::service::Client;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "odb")]
#[command(about = "Interactive client for the odb daemon")]
#[command(version)]
struct Cli {
    /// IPC socket path
    #[arg(short, long, env = "ODB_SOCKET_PATH", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.socket.exists() {
        println!("fatal: did not find IPC channel");
        println!("[?]: Is the daemon running?");
        return ExitCode::FAILURE;
    }

    let mut client = match Client::connect(&cli.socket).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("-- odb client {CLIENT_VERSION} --");

    loop {
        let _ = stdout.write_all(PROMPT.as_bytes()).await;
        let _ = stdout.flush().await;

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("fatal: {e}");
                return ExitCode::FAILURE;
            }
        };

        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(Command::Help)) => println!("{HELP_TEXT}"),
            Ok(Some(Command::Version)) => println!("{CLIENT_VERSION}"),
            Ok(Some(Command::Link)) => println!("ipc link @ {}", cli.socket.display()),
            Ok(Some(Command::Quit)) => return ExitCode::SUCCESS,
            Ok(Some(Command::Run(request))) => match execute(&mut client, &request).await {
                Ok(output) => println!("{output}"),
                Err(odb::OdbError::Storage(err)) => println!("[!] {err}"),
                Err(e) => {
                    eprintln!("fatal: {e}");
                    return ExitCode::FAILURE;
                }
            },
            Err(e) => println!("{e}"),
        }
    }
}
