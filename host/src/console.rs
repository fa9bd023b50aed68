use std::io::{self, Read, Write};
use std::thread;

use tokio::sync::mpsc;

use weather_station_common::devices::ControlChannel;

/// The terminal as the station's control channel.
///
/// A reader thread forwards stdin byte by byte; the command task drains them
/// without blocking.
pub struct StdinConsole {
    input: mpsc::UnboundedReceiver<u8>,
}

impl StdinConsole {
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || {
                for byte in io::stdin().lock().bytes() {
                    match byte {
                        Ok(byte) if tx.send(byte).is_ok() => {}
                        Ok(_) => break,
                        Err(e) => {
                            log::warn!("stdin closed: {e}");
                            break;
                        }
                    }
                }
            })?;

        Ok(Self { input: rx })
    }
}

impl ControlChannel for StdinConsole {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.try_recv().ok()
    }

    fn write_line(&mut self, line: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
            log::debug!("console write failed: {e}");
        }
    }
}
