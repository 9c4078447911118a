use clap::Parser;
use log::*;
#[cfg(debug_assertions)]
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::{
    append::rolling_file::{
        RollingFileAppender,
        policy::compound::{
            CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
        },
    },
    config::{Appender, Config as LogConfig, Logger, Root},
    encode::pattern::PatternEncoder,
};
use serde::{Deserialize, Serialize};
use std::{net::IpAddr, path::PathBuf, str::FromStr};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    select,
    time::{Duration, interval},
};
use wordgrid_common::{
    messages::{ClientEvent, ServerEvent},
    timing,
};

mod network;
mod view;

use view::ViewState;

const APP_NAME: &str = "wordgrid-console";

#[derive(Serialize, Deserialize, Debug)]
pub struct AppConfig {
    server_addr: IpAddr,
    server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: IpAddr::from_str("127.0.0.1").unwrap(),
            server_port: 8000,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Name of the room to join
    room: String,

    #[clap(long, short, action(clap::ArgAction::Count))]
    /// Increase the log verbosity
    verbose: u8,

    #[clap(long)]
    /// Address of the game server, overriding the config file
    server_addr: Option<IpAddr>,

    #[clap(long)]
    /// Port of the game server, overriding the config file
    port: Option<u16>,

    #[clap(long)]
    /// Directory within which log files will be placed, default is platform dependent
    log_location: Option<PathBuf>,

    #[clap(long, default_value = "5000000")]
    /// Max size in bytes that a log file is allowed to reach before being rolled over
    log_max_file_size: u64,

    #[clap(long, default_value = "3")]
    /// Number of archived logs to keep
    num_old_logs: u32,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let log_base_path = args.log_location.unwrap_or_else(|| {
        let mut path = directories::BaseDirs::new()
            .expect("Could not find a directory to store logs")
            .data_local_dir()
            .to_path_buf();
        path.push("wordgrid-console-logs");
        path
    });
    let mut log_path = log_base_path.clone();
    let mut archived_log_path = log_base_path.clone();
    log_path.push(format!("{APP_NAME}-log.txt"));
    archived_log_path.push(format!("{APP_NAME}-log-{{}}.txt.gz"));

    // The console is the game display, so file logging only in release
    #[cfg(debug_assertions)]
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{d} {h({l:5})} {M}] {m}{n}")))
        .build();

    let roller = FixedWindowRoller::builder()
        .build(
            archived_log_path.as_os_str().to_str().unwrap(),
            args.num_old_logs,
        )
        .unwrap();
    let file_policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(args.log_max_file_size)),
        Box::new(roller),
    );
    let file_appender = RollingFileAppender::builder()
        .append(true)
        .encoder(Box::new(PatternEncoder::new("[{d} {l:5} {M}] {m}{n}")))
        .build(log_path, Box::new(file_policy))
        .unwrap();

    let root = Root::builder().appender("file_appender");
    #[cfg(debug_assertions)]
    let root = root.appender("console");
    let root = root.build(LevelFilter::Error);

    let log_config = LogConfig::builder()
        .appender(Appender::builder().build("file_appender", Box::new(file_appender)));

    #[cfg(debug_assertions)]
    let log_config = log_config.appender(Appender::builder().build("console", Box::new(console)));

    let log_config = log_config
        .logger(Logger::builder().build("wordgrid_console", log_level))
        .logger(Logger::builder().build("wordgrid_common", log_level))
        .build(root)
        .unwrap();

    log4rs::init_config(log_config).unwrap();
    log_panics::init();

    let config: AppConfig = match confy::load(APP_NAME, None) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file, overwriting with default. Error: {e}");
            let config = AppConfig::default();
            confy::store(APP_NAME, None, &config).unwrap();
            config
        }
    };

    let addr = args.server_addr.unwrap_or(config.server_addr);
    let port = args.port.unwrap_or(config.server_port);

    run(addr, port, args.room).await
}

async fn run(
    addr: IpAddr,
    port: u16,
    room: String,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut view = ViewState::new(room);
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = interval(Duration::from_secs(1));
    let mut awaiting_confirmation = false;

    println!("Joining room {}. Type a word to guess it, 'new' to start", view.room());
    println!("a new game, or 'quit' to leave.");

    'connection: loop {
        let stream = network::connect(addr, port).await;
        let (read, mut write) = stream.into_split();
        let mut events = BufReader::new(read).lines();

        view.reset();
        let join = ClientEvent::Join {
            room: view.room().to_string(),
        };
        if network::send_event(&mut write, &join).await.is_err() {
            continue 'connection;
        }

        let mut last_time_line = None;

        loop {
            select! {
                line = events.next_line() => {
                    match line {
                        Ok(Some(line)) => match serde_json::from_str::<ServerEvent>(&line) {
                            Ok(ServerEvent::ReloadPage) => {
                                info!("Server requested a reload");
                                view.reset();
                                let join = ClientEvent::Join {
                                    room: view.room().to_string(),
                                };
                                if network::send_event(&mut write, &join).await.is_err() {
                                    continue 'connection;
                                }
                            }
                            Ok(event) => {
                                view.apply(event);
                                print!("{}", view.render(timing::now_millis()));
                            }
                            Err(e) => warn!("Server sent an unparseable event: {e}"),
                        },
                        Ok(None) | Err(_) => {
                            error!("Connection to server lost! Attempting to reconnect!");
                            continue 'connection;
                        }
                    }
                }
                _ = tick.tick() => {
                    let now = timing::now_millis();
                    if view.countdown_expired(now) {
                        let expired = ClientEvent::TimerExpired {
                            room: view.room().to_string(),
                        };
                        if network::send_event(&mut write, &expired).await.is_err() {
                            continue 'connection;
                        }
                    }
                    let time_line = view.time_display(now);
                    if time_line != last_time_line {
                        if let Some(ref time) = time_line {
                            println!("{time}");
                        }
                        last_time_line = time_line;
                    }
                }
                line = input.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let line = line.trim().to_string();
                            if awaiting_confirmation {
                                awaiting_confirmation = false;
                                if line.eq_ignore_ascii_case("y") {
                                    info!("Starting new game...");
                                    let new_game = ClientEvent::NewGame {
                                        room: view.room().to_string(),
                                    };
                                    if network::send_event(&mut write, &new_game).await.is_err() {
                                        continue 'connection;
                                    }
                                }
                            } else if line.is_empty() {
                                // Nothing to do
                            } else if line.eq_ignore_ascii_case("quit") {
                                return Ok(());
                            } else if line.eq_ignore_ascii_case("new") {
                                println!(
                                    "Do you want to start a new game? The current board will be cleared. [y/N]"
                                );
                                awaiting_confirmation = true;
                            } else {
                                let guess = ClientEvent::Guess {
                                    room: view.room().to_string(),
                                    guess: line,
                                };
                                if network::send_event(&mut write, &guess).await.is_err() {
                                    continue 'connection;
                                }
                            }
                        }
                        Ok(None) => return Ok(()),
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
    }
}
