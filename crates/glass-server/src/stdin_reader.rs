//! Reads newline-delimited JSON messages from stdin (spec.md §12): a
//! dedicated thread, non-blocking `try_send` so a slow consumer never
//! stalls the reader, and a `Quit` sent on EOF or read error.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use glass_proto::InboundMessage;

pub enum StdinEvent {
    Message(InboundMessage),
    Quit,
}

/// Spawns the stdin-reading thread. Each line is parsed as one
/// `InboundMessage`; malformed lines are logged and dropped per spec.md
/// §7's "malformed input" policy rather than killing the reader.
pub fn spawn(tx: Sender<StdinEvent>, echo: bool) -> JoinHandle<()> {
    thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let stdin = io::stdin();
            let reader = stdin.lock();

            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if echo {
                            log::debug!("stdin: {line}");
                        }
                        match InboundMessage::parse(line) {
                            Ok(msg) => match tx.try_send(StdinEvent::Message(msg)) {
                                Ok(()) => {}
                                Err(crossbeam_channel::TrySendError::Full(_)) => {
                                    log::warn!("inbound message channel full, dropping message");
                                }
                                Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                                    log::debug!("inbound message channel disconnected, exiting stdin reader");
                                    return;
                                }
                            },
                            Err(e) => {
                                log::warn!("failed to parse stdin line '{line}': {e}");
                            }
                        }
                    }
                    Err(e) => {
                        match e.kind() {
                            io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => {
                                log::info!("stdin closed, shutting down gracefully");
                            }
                            io::ErrorKind::Interrupted => {
                                log::warn!("stdin read interrupted, shutting down");
                            }
                            _ => {
                                log::error!("stdin read error: {e}");
                            }
                        }
                        let _ = tx.try_send(StdinEvent::Quit);
                        return;
                    }
                }
            }

            let _ = tx.try_send(StdinEvent::Quit);
            log::debug!("stdin reader thread exiting (EOF)");
        })
        .expect("failed to spawn stdin reader thread")
}
