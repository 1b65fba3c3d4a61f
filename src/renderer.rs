//! Render finished frames of the particle field to the user's terminal.

use std::sync::Arc;

use color_eyre::eyre::Result;
use tokio::sync::mpsc;

use termwiz::surface::Change as TermwizChange;
use termwiz::surface::Surface as TermwizSurface;
use termwiz::terminal::buffered::BufferedTerminal;
use termwiz::terminal::{ScreenSize, Terminal as TermwizTerminal};

use crate::run::FrameUpdate;
use crate::shared_state::SharedState;

/// `Renderer`
pub(crate) struct Renderer {
    /// Shared app state
    pub state: Arc<SharedState>,
    /// The terminal's width
    pub width: u16,
    /// The terminal's height
    pub height: u16,
}

impl Renderer {
    /// Create a renderer to render to a user's terminal
    fn new(state: Arc<SharedState>) -> Result<Self> {
        let mut renderer = Self {
            state,
            width: 0,
            height: 0,
        };

        let size = Self::get_users_tty_size()?;
        renderer.width = size.cols.try_into()?;
        renderer.height = size.rows.try_into()?;

        Ok(renderer)
    }

    /// Instantiate and run. Returns the handle of the render task and the channel on which it
    /// receives finished frames.
    pub fn start(
        state: Arc<SharedState>,
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> (
        tokio::task::JoinHandle<Result<()>>,
        mpsc::Sender<FrameUpdate>,
    ) {
        let (surfaces_tx, surfaces_rx) = mpsc::channel(64);
        let protocol_rx = protocol_tx.subscribe();

        let handle = tokio::spawn(async move {
            // This would be much simpler if async closures were stable, because then we could use
            // the `?` syntax.
            match Self::new(Arc::clone(&state)) {
                Ok(mut renderer) => {
                    let result = renderer
                        .run(surfaces_rx, protocol_rx, protocol_tx.clone())
                        .await;

                    if let Err(error) = result {
                        crate::run::broadcast_protocol_end(&protocol_tx);
                        return Err(error);
                    };
                }
                Err(error) => {
                    crate::run::broadcast_protocol_end(&protocol_tx);
                    return Err(error);
                }
            };

            Ok(())
        });

        (handle, surfaces_tx)
    }

    /// We need this just because I can't figure out how to pass `Box<dyn Terminal>` to
    /// `BufferedTerminal::new()`
    fn get_termwiz_terminal() -> Result<impl TermwizTerminal> {
        let capabilities = termwiz::caps::Capabilities::new_from_env()?;
        Ok(termwiz::terminal::new_terminal(capabilities)?)
    }

    /// Just for initialisation
    pub fn get_users_tty_size() -> Result<ScreenSize> {
        let mut terminal = Self::get_termwiz_terminal()?;
        Ok(terminal.get_screen_size()?)
    }

    /// Get the user's current terminal size and propagate it
    async fn handle_resize<T: TermwizTerminal + Send>(
        &mut self,
        composited_terminal: &mut BufferedTerminal<T>,
        protocol_tx: &tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> Result<()> {
        let is_resized = composited_terminal.check_for_resize()?;
        if !is_resized {
            return Ok(());
        }

        composited_terminal.repaint()?;

        let (width, height) = composited_terminal.dimensions();
        self.width = width.try_into()?;
        self.height = height.try_into()?;
        self.state.set_tty_size(self.width, self.height).await;
        protocol_tx.send(crate::run::Protocol::Resize {
            width: self.width,
            height: self.height,
        })?;

        Ok(())
    }

    /// Listen for frame updates from the particle field.
    /// It lives in its own method so that we can catch any errors and ensure that the user's
    /// terminal is always returned to cooked mode.
    async fn run(
        &mut self,
        mut surfaces: mpsc::Receiver<FrameUpdate>,
        mut protocol_rx: tokio::sync::broadcast::Receiver<crate::run::Protocol>,
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> Result<()> {
        tracing::debug!("Putting user's terminal into raw mode");
        let mut copy_of_users_terminal = Self::get_termwiz_terminal()?;
        copy_of_users_terminal.set_raw_mode()?;
        let mut composited_terminal = BufferedTerminal::new(copy_of_users_terminal)?;
        composited_terminal.add_change(TermwizChange::CursorVisibility(
            termwiz::surface::CursorVisibility::Hidden,
        ));
        composited_terminal.flush()?;

        tracing::debug!("Starting render loop");
        #[expect(
            clippy::integer_division_remainder_used,
            reason = "`tokio::select!` generates this."
        )]
        loop {
            tokio::select! {
                Some(update) = surfaces.recv() => {
                    self.handle_resize(&mut composited_terminal, &protocol_tx).await?;
                    self.render(update, &mut composited_terminal)?;
                }
                Ok(message) = protocol_rx.recv() => {
                    if matches!(message, crate::run::Protocol::End) {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Exited render loop");

        tracing::debug!("Setting user's terminal back to cooked mode");
        composited_terminal.add_change(TermwizChange::CursorVisibility(
            termwiz::surface::CursorVisibility::Visible,
        ));
        composited_terminal.flush()?;
        composited_terminal.terminal().set_cooked_mode()?;

        Ok(())
    }

    /// Do a single render to the user's actual terminal. The buffered terminal uses a diffing
    /// algorithm to make the minimum number of changes.
    fn render(
        &mut self,
        update: FrameUpdate,
        composited_terminal: &mut BufferedTerminal<impl TermwizTerminal + Send>,
    ) -> Result<()> {
        let FrameUpdate::FieldSurface(surface) = update;

        let mut frame = TermwizSurface::new(self.width.into(), self.height.into());
        frame.draw_from_screen(&surface.to_cells(), 0, 0);
        composited_terminal.draw_from_screen(&frame, 0, 0);

        // This is where we actually render to the user's real terminal.
        composited_terminal.flush()?;

        Ok(())
    }
}
