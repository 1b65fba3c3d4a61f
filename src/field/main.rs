//! The particle field's tick loop: advance the simulation once per frame, paint it onto a fresh
//! surface and send the result off to the renderer.

use std::sync::Arc;

use color_eyre::eyre::Result;

use super::simulation::Simulation;
use crate::shared_state::SharedState;

/// The number of microseconds in a second.
const ONE_MICROSECOND: u64 = 1_000_000;

/// `ParticleField`
pub(crate) struct ParticleField {
    /// A channel to send final rendered output.
    output_channel: tokio::sync::mpsc::Sender<crate::run::FrameUpdate>,
    /// All the orbiting particles.
    simulation: Simulation,
    /// The number of particles to keep in the field.
    density: usize,
    /// The target frame rate.
    frame_rate: u32,
    /// TTY width
    width: u16,
    /// TTY height
    height: u16,
    /// The time at which the previous frame was rendered.
    last_frame_tick: std::time::Instant,
}

impl ParticleField {
    /// Instantiate
    fn new(
        output_channel: tokio::sync::mpsc::Sender<crate::run::FrameUpdate>,
        config: &crate::config::Config,
        maybe_seed: Option<u64>,
    ) -> Self {
        Self {
            output_channel,
            simulation: Simulation::new(config.interactive, maybe_seed),
            density: config.density,
            // A frame rate of 0 would make the frame limiter divide by zero.
            frame_rate: config.frame_rate.max(1),
            width: 0,
            height: 0,
            last_frame_tick: std::time::Instant::now(),
        }
    }

    /// Our main entrypoint.
    pub(crate) async fn start(
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
        output: tokio::sync::mpsc::Sender<crate::run::FrameUpdate>,
        state: Arc<SharedState>,
        maybe_seed: Option<u64>,
    ) -> Result<()> {
        let config = state.config.read().await.clone();
        let mut field = Self::new(output, &config, maybe_seed);
        let mut protocol = protocol_tx.subscribe();

        let tty_size = state.get_tty_size().await;
        field.set_tty_size(tty_size.width, tty_size.height);

        #[expect(
            clippy::integer_division_remainder_used,
            reason = "This is caused by the `tokio::select!`"
        )]
        loop {
            tokio::select! {
                () = field.sleep_until_next_frame_tick() => {
                    if !field.render().await? {
                        break;
                    }
                },
                Ok(message) = protocol.recv() => {
                    if matches!(message, crate::run::Protocol::End) {
                        break;
                    }
                    field.handle_protocol_message(&message);
                }
            }
        }

        tracing::debug!("Leaving the particle field loop");
        Ok(())
    }

    /// Keep track of the size of the underlying terminal. The simulation works in half-block
    /// pixels, so its viewport is twice as tall as the TTY has rows. Resizing rebuilds the whole
    /// field between ticks, a frame never observes a half-applied resize.
    fn set_tty_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.simulation
            .resize(f32::from(width), f32::from(height) * 2.0, self.density);
    }

    /// Handle protocol messages, like resizing and fresh pointer samples.
    fn handle_protocol_message(&mut self, message: &crate::run::Protocol) {
        tracing::trace!("Particle field received protocol message: {message:?}");

        #[expect(
            clippy::wildcard_enum_match_arm,
            reason = "We're just handling the common cases here."
        )]
        match *message {
            crate::run::Protocol::Resize { width, height } => {
                self.set_tty_size(width, height);
            }
            crate::run::Protocol::Pointer { x, y } => {
                self.simulation.set_pointer(x, y);
            }
            _ => (),
        }
    }

    /// Sleep until the next frame render is due.
    async fn sleep_until_next_frame_tick(&mut self) {
        let target = ONE_MICROSECOND.wrapping_div(self.frame_rate.into());
        let target_frame_rate_micro = std::time::Duration::from_micros(target);
        if let Some(wait) = target_frame_rate_micro.checked_sub(self.last_frame_tick.elapsed()) {
            tokio::time::sleep(wait).await;
        }
        self.last_frame_tick = std::time::Instant::now();
    }

    /// One frame of the field: advance every particle, then paint particles and connection lines.
    /// Returns `false` once the renderer has gone away and no further frames can be delivered.
    async fn render(&mut self) -> Result<bool> {
        if self.width == 0 || self.height == 0 {
            return Ok(true);
        }

        if !self.simulation.is_ready() {
            self.simulation.resize(
                f32::from(self.width),
                f32::from(self.height) * 2.0,
                self.density,
            );
        }

        self.simulation.tick();

        let mut surface =
            crate::surface::Surface::new(self.width.into(), self.height.into());

        for particle in &self.simulation.particles {
            let halo_colour =
                crate::surface::hsl_colour(particle.hue, 0.7, 0.6, particle.opacity);
            surface.halo(particle.position, particle.size * 2.0, halo_colour);

            let core_colour =
                crate::surface::hsl_colour(particle.hue, 1.0, 0.8, particle.opacity);
            surface.fill_circle(particle.position, particle.size, core_colour);
        }

        // All particle updates happen before any connection is computed, so a frame never shows
        // a line to a stale position.
        for connection in self.simulation.connections() {
            let colour = crate::surface::hsl_colour(connection.hue, 0.8, 0.7, connection.alpha);
            surface.line(connection.from, connection.to, colour);
        }

        let send_result = self
            .output_channel
            .send(crate::run::FrameUpdate::FieldSurface(surface))
            .await;
        if send_result.is_err() {
            tracing::debug!("The frame channel closed, stopping the particle field");
            return Ok(false);
        }

        Ok(true)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    async fn started_field(
        frame_rate: u32,
    ) -> (
        tokio::sync::broadcast::Sender<crate::run::Protocol>,
        tokio::sync::mpsc::Receiver<crate::run::FrameUpdate>,
        tokio::task::JoinHandle<Result<()>>,
    ) {
        let (protocol_tx, _) = tokio::sync::broadcast::channel(64);
        let (surfaces_tx, surfaces_rx) = tokio::sync::mpsc::channel(64);
        let state = SharedState::init(0, 0, protocol_tx.clone()).await.unwrap();
        {
            let mut config = state.config.write().await;
            config.density = 3;
            config.interactive = false;
            config.frame_rate = frame_rate;
        }

        let handle = tokio::spawn(ParticleField::start(
            protocol_tx.clone(),
            surfaces_tx,
            state,
            Some(7),
        ));

        (protocol_tx, surfaces_rx, handle)
    }

    /// The field task only sees broadcasts sent after it has subscribed, so keep resizing until
    /// a frame proves the loop is up.
    async fn resize_until_first_frame(
        protocol_tx: &tokio::sync::broadcast::Sender<crate::run::Protocol>,
        surfaces_rx: &mut tokio::sync::mpsc::Receiver<crate::run::FrameUpdate>,
        width: u16,
        height: u16,
    ) -> crate::run::FrameUpdate {
        for _ in 0u8..50 {
            // Sending can fail until the field task has subscribed, just keep trying.
            let _result = protocol_tx.send(crate::run::Protocol::Resize { width, height });
            let maybe_frame =
                tokio::time::timeout(std::time::Duration::from_millis(100), surfaces_rx.recv())
                    .await;
            if let Ok(Some(frame)) = maybe_frame {
                return frame;
            }
        }
        panic!("No frame arrived in time");
    }

    #[tokio::test]
    async fn frames_flow_after_a_resize() {
        let (protocol_tx, mut surfaces_rx, handle) = started_field(200).await;

        let frame = resize_until_first_frame(&protocol_tx, &mut surfaces_rx, 50, 50).await;
        let crate::run::FrameUpdate::FieldSurface(surface) = frame;
        assert_eq!(surface.width, 50);
        assert_eq!(surface.height, 50);

        crate::run::broadcast_protocol_end(&protocol_tx);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn zero_sized_viewport_produces_no_frames() {
        let (protocol_tx, mut surfaces_rx, handle) = started_field(200).await;

        // No resize has arrived, so the viewport is still 0×0 and every tick skips rendering.
        let no_frame =
            tokio::time::timeout(std::time::Duration::from_millis(200), surfaces_rx.recv()).await;
        assert!(no_frame.is_err());

        crate::run::broadcast_protocol_end(&protocol_tx);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn zero_frame_rate_is_clamped_and_still_renders() {
        let (protocol_tx, mut surfaces_rx, handle) = started_field(0).await;

        // A 1fps floor means the first frame can take a second to arrive.
        let frame = resize_until_first_frame(&protocol_tx, &mut surfaces_rx, 10, 10).await;
        let crate::run::FrameUpdate::FieldSurface(surface) = frame;
        assert_eq!(surface.width, 10);

        crate::run::broadcast_protocol_end(&protocol_tx);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn teardown_stops_the_tick_loop() {
        let (protocol_tx, mut surfaces_rx, handle) = started_field(200).await;

        resize_until_first_frame(&protocol_tx, &mut surfaces_rx, 20, 20).await;

        crate::run::broadcast_protocol_end(&protocol_tx);
        // Sending `End` twice must be harmless.
        crate::run::broadcast_protocol_end(&protocol_tx);
        handle.await.unwrap().unwrap();

        // The loop has dropped its sender, so after draining any in-flight frames the channel
        // reports closed and the frame count stops for good.
        loop {
            match surfaces_rx.try_recv() {
                Ok(_) => (),
                Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => break,
                Err(tokio::sync::mpsc::error::TryRecvError::Empty) => {
                    panic!("Channel still open after teardown")
                }
            }
        }
    }
}
