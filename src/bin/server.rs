//! TCP order-entry server.
//!
//! Clients connect over TCP and exchange newline-delimited fixed-tag
//! messages: new order ('D'), cancel ('F'), and modify ('G') in, execution
//! reports ('8') and rejects ('3') out. The engine is serialized behind a
//! coarse lock at the boundary; each client gets its own reader thread.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tickmatch::command::{OrderAccepted, OrderCanceled, OutputEvent};
use tickmatch::config::{Config, DEFAULT_CONFIG_PATH};
use tickmatch::events::OrderUpdate;
use tickmatch::fix::{self, FixMessage};
use tickmatch::types::OrderStatus;
use tickmatch::Engine;

const SYMBOL: &str = "AAPL";
const ORDER_CAPACITY: u32 = 1_000_000;

fn main() -> ExitCode {
    let config = match Config::load(DEFAULT_CONFIG_PATH) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("using default config ({err})");
            Config::default()
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut engine = Engine::with_risk(SYMBOL, ORDER_CAPACITY, config.risk.to_limits());
    engine.warm_up();
    let engine = Arc::new(Mutex::new(engine));

    let listener = match TcpListener::bind(("0.0.0.0", config.server.port)) {
        Ok(listener) => listener,
        Err(err) => {
            error!(port = config.server.port, %err, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(symbol = SYMBOL, port = config.server.port, "order entry listening");

    let clients = Arc::new(AtomicUsize::new(0));
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };

        if clients.load(Ordering::SeqCst) >= config.server.max_clients {
            warn!(limit = config.server.max_clients, "client limit reached, dropping connection");
            continue;
        }

        clients.fetch_add(1, Ordering::SeqCst);
        let engine = Arc::clone(&engine);
        let clients = Arc::clone(&clients);
        thread::spawn(move || {
            if let Err(err) = serve_client(stream, engine) {
                warn!(%err, "client session ended with error");
            }
            clients.fetch_sub(1, Ordering::SeqCst);
        });
    }

    ExitCode::SUCCESS
}

fn serve_client(stream: TcpStream, engine: Arc<Mutex<Engine>>) -> std::io::Result<()> {
    let peer = stream.peer_addr()?;
    info!(%peer, "client connected");

    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    for line in reader.split(b'\n') {
        let line = line?;
        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches('\r');
        if text.is_empty() {
            continue;
        }

        let command = FixMessage::parse(text).and_then(|message| fix::command_from_message(&message));
        match command {
            Ok(command) => {
                let events = engine.lock().unwrap().process_command(command);
                for event in events {
                    if let Some(reply) = reply_for(&event) {
                        writer.write_all(reply.serialize().as_bytes())?;
                        writer.write_all(b"\n")?;
                    }
                }
            }
            Err(err) => {
                warn!(%peer, %err, "rejecting unparseable message");
                let mut reject = FixMessage::new(fix::msg_type::REJECT);
                reject.set(fix::tags::TEXT, err.to_string());
                writer.write_all(reject.serialize().as_bytes())?;
                writer.write_all(b"\n")?;
            }
        }
    }

    info!(%peer, "client disconnected");
    Ok(())
}

/// Translate an engine event into the client's execution report.
/// Trade events carry no addressee; the submitting client learns its fills
/// from the terminal accepted/update report.
fn reply_for(event: &OutputEvent) -> Option<FixMessage> {
    match event {
        OutputEvent::Trade(_) => None,
        OutputEvent::Accepted(OrderAccepted {
            order_id,
            resting,
            filled,
            ..
        }) => {
            let status = if *filled > 0 {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::New
            };
            Some(fix::exec_report(
                SYMBOL,
                &OrderUpdate {
                    order_id: *order_id,
                    status,
                    remaining: *resting,
                    filled: *filled,
                },
                None,
            ))
        }
        OutputEvent::Canceled(OrderCanceled {
            order_id, filled, ..
        }) => Some(fix::exec_report(
            SYMBOL,
            &OrderUpdate {
                order_id: *order_id,
                status: OrderStatus::Cancelled,
                remaining: 0,
                filled: *filled,
            },
            None,
        )),
        OutputEvent::Rejected(rejected) => {
            let mut reject = FixMessage::new(fix::msg_type::REJECT);
            reject.set(fix::tags::CL_ORD_ID, rejected.order_id.to_string());
            reject.set(fix::tags::TEXT, format!("{:?}", rejected.reason));
            Some(reject)
        }
        OutputEvent::Update(update) => Some(fix::exec_report(SYMBOL, update, None)),
    }
}
