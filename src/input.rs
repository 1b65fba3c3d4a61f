//! Handle all the raw input directly from the end user.
//!
//! The renderer putting the terminal into raw mode also enables mouse reporting, so mouse
//! positions arrive here as escape sequences on STDIN. Samples are forwarded on the protocol
//! channel at a configurable minimum interval, deliberately decoupled from the frame rate.

use std::io::Read as _;

use color_eyre::eyre::Result;

/// Bytes from STDIN
type BytesFromSTDIN = [u8; 128];

/// Handle input from the user
pub(crate) struct Input {
    /// The main protocol channel.
    protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    /// The minimum interval between forwarded pointer samples.
    pointer_interval: std::time::Duration,
    /// When the last pointer sample was forwarded.
    last_pointer_sample: std::time::Instant,
}

impl Input {
    /// Start a thread to listen and parse the end user's STDIN and forward it to the rest of the
    /// application.
    pub fn start(
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
        pointer_interval_ms: u64,
    ) -> std::thread::JoinHandle<std::result::Result<(), color_eyre::eyre::Error>> {
        // The Tokio docs actually suggest using `std::thread` to listen on STDIN for interactive
        // applications.
        std::thread::spawn(move || -> Result<()> {
            let protocol_for_shutdown = protocol_tx.clone();
            let mut input = Self {
                protocol_tx,
                pointer_interval: std::time::Duration::from_millis(pointer_interval_ms),
                last_pointer_sample: std::time::Instant::now(),
            };
            let result = input.consume_stdin();
            if let Err(error) = result {
                crate::run::broadcast_protocol_end(&protocol_for_shutdown);
                return Err(error);
            }
            Ok(())
        })
    }

    /// Listen to the end user's STDIN and parse the bytes into mouse and keyboard events.
    fn consume_stdin(&mut self) -> Result<()> {
        tracing::debug!("Starting to listen on STDIN");

        let stdin = std::io::stdin();
        let mut reader = std::io::BufReader::new(stdin);
        let mut parser = termwiz::input::InputParser::new();

        loop {
            let mut buffer: BytesFromSTDIN = [0; 128];
            match reader.read(&mut buffer[..]) {
                Ok(bytes_read) => {
                    let Some(bytes) = buffer.get(0..bytes_read) else {
                        tracing::warn!("Couldn't get bytes from STDIN input buffer");
                        continue;
                    };

                    let mut events = Vec::new();
                    parser.parse(bytes, |event| events.push(event), false);
                    for event in events {
                        if self.handle_event(&event) {
                            tracing::debug!("STDIN thread received an exit key");
                            crate::run::broadcast_protocol_end(&self.protocol_tx);
                            return Ok(());
                        }
                    }
                }
                Err(err) => {
                    return Err(color_eyre::eyre::Error::new(err));
                }
            }
        }
    }

    /// React to a single parsed input event. Returns `true` when the user asked to exit.
    fn handle_event(&mut self, event: &termwiz::input::InputEvent) -> bool {
        tracing::trace!("Parsed input event: {event:?}");

        match event {
            termwiz::input::InputEvent::Mouse(mouse) => {
                self.handle_mouse_event(mouse);
                false
            }
            termwiz::input::InputEvent::Key(key) => Self::is_exit_key(key),
            termwiz::input::InputEvent::Resized { cols, rows } => {
                self.send(crate::run::Protocol::Resize {
                    width: u16::try_from(*cols).unwrap_or_default(),
                    height: u16::try_from(*rows).unwrap_or_default(),
                });
                false
            }
            _ => false,
        }
    }

    /// Forward a mouse position, converted to half-block pixel coordinates, unless one was
    /// forwarded too recently.
    fn handle_mouse_event(&mut self, mouse: &termwiz::input::MouseEvent) {
        if self.last_pointer_sample.elapsed() < self.pointer_interval {
            return;
        }
        self.last_pointer_sample = std::time::Instant::now();

        // Termwiz mouse coordinates are 1-based cells. The y-axis is doubled because every cell
        // holds 2 half-block pixels.
        self.send(crate::run::Protocol::Pointer {
            x: f32::from(mouse.x.saturating_sub(1)),
            y: f32::from(mouse.y.saturating_sub(1)) * 2.0,
        });
    }

    /// `q`, `Escape` or `Ctrl-C` all exit.
    fn is_exit_key(key: &termwiz::input::KeyEvent) -> bool {
        match key.key {
            termwiz::input::KeyCode::Char('q') | termwiz::input::KeyCode::Escape => true,
            termwiz::input::KeyCode::Char('c') => {
                key.modifiers.contains(termwiz::input::Modifiers::CTRL)
            }
            _ => false,
        }
    }

    /// Send a protocol message, logging rather than erroring when there are no listeners left.
    fn send(&self, message: crate::run::Protocol) {
        let result = self.protocol_tx.send(message);
        if let Err(error) = result {
            tracing::error!("Error sending input event from thread to task: {error:?}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn plain_key(key: termwiz::input::KeyCode) -> termwiz::input::KeyEvent {
        termwiz::input::KeyEvent {
            key,
            modifiers: termwiz::input::Modifiers::NONE,
        }
    }

    #[test]
    fn exit_keys_are_recognised() {
        assert!(Input::is_exit_key(&plain_key(
            termwiz::input::KeyCode::Char('q')
        )));
        assert!(Input::is_exit_key(&plain_key(
            termwiz::input::KeyCode::Escape
        )));
        assert!(Input::is_exit_key(&termwiz::input::KeyEvent {
            key: termwiz::input::KeyCode::Char('c'),
            modifiers: termwiz::input::Modifiers::CTRL,
        }));
        assert!(!Input::is_exit_key(&plain_key(
            termwiz::input::KeyCode::Char('c')
        )));
        assert!(!Input::is_exit_key(&plain_key(
            termwiz::input::KeyCode::Char('x')
        )));
    }

    #[test]
    fn pointer_samples_are_throttled() {
        let (protocol_tx, mut protocol_rx) = tokio::sync::broadcast::channel(16);
        let mut input = Input {
            protocol_tx,
            pointer_interval: std::time::Duration::from_secs(3600),
            last_pointer_sample: std::time::Instant::now(),
        };

        let mouse = termwiz::input::MouseEvent {
            x: 5,
            y: 3,
            mouse_buttons: termwiz::input::MouseButtons::NONE,
            modifiers: termwiz::input::Modifiers::NONE,
        };
        input.handle_mouse_event(&mouse);
        input.handle_mouse_event(&mouse);

        // The interval is huge, so everything within this test window is dropped.
        assert!(matches!(
            protocol_rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn pointer_samples_convert_to_pixel_space() {
        let (protocol_tx, mut protocol_rx) = tokio::sync::broadcast::channel(16);
        let mut input = Input {
            protocol_tx,
            pointer_interval: std::time::Duration::ZERO,
            last_pointer_sample: std::time::Instant::now(),
        };

        input.handle_mouse_event(&termwiz::input::MouseEvent {
            x: 5,
            y: 3,
            mouse_buttons: termwiz::input::MouseButtons::NONE,
            modifiers: termwiz::input::Modifiers::NONE,
        });

        let Ok(crate::run::Protocol::Pointer { x, y }) = protocol_rx.try_recv() else {
            panic!("Expected a pointer message");
        };
        assert!((x - 4.0).abs() < f32::EPSILON);
        assert!((y - 4.0).abs() < f32::EPSILON);
    }
}
