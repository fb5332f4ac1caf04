//! Per-axis motion state machine.
//!
//! The controller never tracks "running" on its own: the link can lose
//! commands, so every decision re-derives the state from a fresh status
//! poll. Typical session against the motor board:
//!
//! * confirm the motor is stopped, stop it if not
//! * set the motion mode
//! * set the parameters (goto target or T1 preset)
//! * start motion
//! * for a goto, poll status until the motor stops

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::command::{AxisId, Command, Direction, MotionMode};
use crate::config::MountConfig;
use crate::error::Result;
use crate::params::AxisParameters;
use crate::status::AxisStatus;
use crate::transport::{Transport, Wire};

/// Position-family values travel with this bias so negative counts fit an
/// unsigned 24-bit field. Internal and public values are always unbiased.
const POSITION_BIAS: i64 = 0x80_0000;

/// Break point increment sent alongside a goto-target increment.
const BREAK_POINT_INCREMENT: u32 = 0x000DAC;

/// Latest polled snapshot of one axis. Overwritten wholesale by
/// [`AxisController::refresh`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisRuntime {
    /// Position in counts, debiased; can be negative.
    pub position: i64,
    pub position_deg: f64,
    /// Goto target in counts, debiased.
    pub goto_target: i64,
    pub goto_target_deg: f64,
    /// Current T1 preset.
    pub step_period: u32,
    pub status: AxisStatus,
}

/// State machine for one motor channel. May be driven from its own task;
/// all commands still serialize through the shared [`Transport`] lock.
#[derive(Debug)]
pub struct AxisController<W: Wire> {
    axis: AxisId,
    transport: Arc<Transport<W>>,
    params: AxisParameters,
    runtime: AxisRuntime,
    poll_interval: Duration,
    refresh_backoff: Duration,
    refresh_max_retries: u32,
}

impl<W: Wire> AxisController<W> {
    pub fn new(
        transport: Arc<Transport<W>>,
        axis: AxisId,
        params: AxisParameters,
        config: &MountConfig,
    ) -> Self {
        AxisController {
            axis,
            transport,
            params,
            runtime: AxisRuntime::default(),
            poll_interval: config.poll_interval,
            refresh_backoff: config.refresh_backoff,
            refresh_max_retries: config.refresh_max_retries,
        }
    }

    pub fn axis(&self) -> AxisId {
        self.axis
    }

    pub fn params(&self) -> &AxisParameters {
        &self.params
    }

    /// Latest snapshot; call [`refresh`](Self::refresh) first when fresh
    /// truth is needed.
    pub fn runtime(&self) -> &AxisRuntime {
        &self.runtime
    }

    /// Whether this axis physically exists on the mount variant.
    pub fn present(&self) -> bool {
        self.params.present()
    }

    /// Poll goto target, position, step period and status, and store the
    /// decoded snapshot. Transport failures are retried with a fixed
    /// backoff up to the configured cap.
    pub async fn refresh(&mut self) -> Result<&AxisRuntime> {
        let mut attempt = 0;
        loop {
            match self.poll().await {
                Ok(runtime) => {
                    self.runtime = runtime;
                    return Ok(&self.runtime);
                }
                Err(e) if attempt < self.refresh_max_retries => {
                    attempt += 1;
                    warn!(
                        "AXIS{}: refresh failed ({e}), retrying in {:?}",
                        self.axis, self.refresh_backoff
                    );
                    sleep(self.refresh_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn poll(&self) -> Result<AxisRuntime> {
        let goto_target = self.inquire_biased(Command::InquireGotoTarget).await?;
        let position = self.inquire_biased(Command::InquirePosition).await?;
        let step_period = self
            .transport
            .send_command(Command::InquireStepPeriod, self.axis, None)
            .await?
            .value()?;
        let triplet = self
            .transport
            .send_command(Command::InquireStatus, self.axis, None)
            .await?
            .status()?;
        let mut status = AxisStatus::from_reply(&triplet)?;
        if !self.params.present() {
            status = status.with_blocked();
        }

        Ok(AxisRuntime {
            position,
            position_deg: self.params.counts_to_degrees(position),
            goto_target,
            goto_target_deg: self.params.counts_to_degrees(goto_target),
            step_period,
            status,
        })
    }

    async fn inquire_biased(&self, cmd: Command) -> Result<i64> {
        let raw = self
            .transport
            .send_command(cmd, self.axis, None)
            .await?
            .value()?;
        Ok(raw as i64 - POSITION_BIAS)
    }

    /// Current position in counts, debiased.
    pub async fn position_counts(&self) -> Result<i64> {
        self.inquire_biased(Command::InquirePosition).await
    }

    /// Current position in degrees.
    pub async fn position_degrees(&self) -> Result<f64> {
        Ok(self.params.counts_to_degrees(self.position_counts().await?))
    }

    /// Slew to `target_degrees` and return once motion has started.
    ///
    /// The board rejects a goto target or a start while the motor runs or
    /// the mode is stale, so the sequence is fixed: synchronous stop, read
    /// position, set mode (clockwise when the target is below the current
    /// position), set target, start.
    pub async fn goto_degrees(&mut self, target_degrees: f64) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        self.stop(true).await?;
        let actual = self.position_degrees().await?;
        let direction = if target_degrees < actual {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        };
        self.set_motion_mode(MotionMode::Goto {
            direction,
            fast: true,
        })
        .await?;
        self.set_goto_target_degrees(target_degrees).await?;
        self.start_motion().await
    }

    /// Track at `speed` degrees per second (sign selects direction).
    ///
    /// A running axis that is already tracking the same way only gets a
    /// speed update; changing direction or mode forces a stop and a full
    /// reconfigure. Zero speed is a plain stop, a zero preset is not a
    /// valid hardware speed.
    pub async fn track_degrees_per_second(&mut self, speed: f64) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        if speed == 0.0 {
            info!("AXIS{}: requested speed 0, stopping axis", self.axis);
            return self.stop(true).await;
        }

        let status = self.refresh().await?.status;
        let cw = !status.ccw();
        let direction = if speed < 0.0 {
            Direction::CounterClockwise
        } else {
            Direction::Clockwise
        };

        if !status.stopped() {
            if !status.tracking() || (cw && speed < 0.0) || (!cw && speed > 0.0) {
                info!(
                    "AXIS{}: track change of mode or direction, tracking:{} cw:{} speed:{}",
                    self.axis,
                    status.tracking(),
                    cw,
                    speed
                );
                self.stop(true).await?;
                self.set_motion_mode(MotionMode::Tracking {
                    direction,
                    fast: false,
                })
                .await?;
                self.set_speed(speed).await?;
                self.start_motion().await
            } else {
                self.set_speed(speed).await
            }
        } else {
            self.set_motion_mode(MotionMode::Tracking {
                direction,
                fast: false,
            })
            .await?;
            self.set_speed(speed).await?;
            self.start_motion().await
        }
    }

    /// Program the tracking speed. The T1 preset is the timer frequency
    /// divided by the step rate; a rate of zero degenerates to the slowest
    /// nonzero speed instead of a division by zero.
    pub async fn set_speed(&mut self, degrees_per_second: f64) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        if degrees_per_second == 0.0 {
            info!("AXIS{}: requested speed 0, stopping axis", self.axis);
            return self.stop(true).await;
        }
        info!(
            "AXIS{}: setting speed to {degrees_per_second} degrees per second",
            self.axis
        );
        let preset = self.t1_preset(degrees_per_second.abs());
        info!("AXIS{}: setting step period to {preset}", self.axis);
        self.transport
            .send_command(Command::SetStepPeriod, self.axis, Some(preset))
            .await?;
        Ok(())
    }

    fn t1_preset(&self, degrees_per_second: f64) -> u32 {
        let counts_per_second = self.params.degrees_to_counts(degrees_per_second);
        let freq = self.params.timer_interrupt_freq as f64;
        let preset = if counts_per_second.abs() <= 0.0 {
            freq
        } else {
            freq / counts_per_second.abs()
        };
        preset as u32
    }

    /// Set the goto target in degrees. The motor has to be stopped.
    pub async fn set_goto_target_degrees(&mut self, target_degrees: f64) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        info!(
            "AXIS{}: setting goto target to {target_degrees} degrees",
            self.axis
        );
        let counts = self.params.degrees_to_counts(target_degrees) as i64;
        self.set_goto_target_counts(counts).await
    }

    /// Set the goto target in counts. The motor has to be stopped.
    pub async fn set_goto_target_counts(&mut self, counts: i64) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        info!(
            "AXIS{}: setting goto target to {counts} counts ({} deg)",
            self.axis,
            self.params.counts_to_degrees(counts)
        );
        self.transport
            .send_command(Command::SetGotoTarget, self.axis, Some(bias(counts)))
            .await?;
        Ok(())
    }

    /// Set a goto target relative to the current position. Untested on
    /// hardware; the plain target path is what the stock firmware gets.
    pub async fn set_goto_target_increment_counts(&mut self, counts: i64) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        info!(
            "AXIS{}: setting goto target increment to {counts} counts",
            self.axis
        );
        self.transport
            .send_command(Command::SetGotoTargetIncrement, self.axis, Some(bias(counts)))
            .await?;
        self.transport
            .send_command(
                Command::SetBreakPointIncrement,
                self.axis,
                Some(BREAK_POINT_INCREMENT),
            )
            .await?;
        Ok(())
    }

    /// Re-zero the board's position counter without moving the motor.
    pub async fn sync_position(&mut self, degrees: f64) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        info!(
            "AXIS{}: synchronizing actual position to {degrees} degrees",
            self.axis
        );
        let counts = self.params.degrees_to_counts(degrees) as i64;
        self.sync_position_counts(counts).await
    }

    /// Re-zero the board's position counter, in counts.
    pub async fn sync_position_counts(&mut self, counts: i64) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        info!(
            "AXIS{}: synchronizing actual position to {counts} counts",
            self.axis
        );
        self.transport
            .send_command(Command::SetAxisPosition, self.axis, Some(bias(counts)))
            .await?;
        Ok(())
    }

    /// Program the motion mode for the next start. The motor has to be
    /// stopped; the board rejects the command otherwise.
    pub async fn set_motion_mode(&self, mode: MotionMode) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        let value = mode.to_byte();
        info!("AXIS{}: setting motion mode {value:#04x}", self.axis);
        self.transport
            .send_command(Command::SetMotionMode, self.axis, Some(value as u32))
            .await?;
        Ok(())
    }

    pub async fn start_motion(&mut self) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        self.transport
            .send_command(Command::StartMotion, self.axis, None)
            .await?;
        info!("AXIS{}: starting motion", self.axis);
        Ok(())
    }

    /// Soft stop (`K`): the motor ramps down, then the channel returns to
    /// tracking mode. Waits for full stop when `synchronous`.
    pub async fn stop(&mut self, synchronous: bool) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        info!("AXIS{}: stopping", self.axis);
        self.transport
            .send_command(Command::SoftStop, self.axis, None)
            .await?;
        if synchronous {
            self.wait_to_stop().await?;
        }
        Ok(())
    }

    /// Instant stop (`L`). Waits for full stop when `synchronous`.
    pub async fn hard_stop(&mut self, synchronous: bool) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        info!("AXIS{}: stopping (hard)", self.axis);
        self.transport
            .send_command(Command::HardStop, self.axis, None)
            .await?;
        if synchronous {
            self.wait_to_stop().await?;
        }
        Ok(())
    }

    /// Poll until the axis reports stopped.
    ///
    /// While a goto runs, the signed distance to target is also watched: a
    /// sign flip means overshoot or wrong-direction motion and gets a soft
    /// stop; a distance growing past the first observed one means runaway
    /// and gets an instant stop. Without the guard a goto that never
    /// reaches its target would block this loop forever. Dropping the
    /// future (e.g. under `tokio::time::timeout`) cancels the wait.
    pub async fn wait_to_stop(&mut self) -> Result<()> {
        if !self.present() {
            return Ok(());
        }
        info!("AXIS{}: waiting to stop", self.axis);
        let first = *self.refresh().await?;
        // Sign encodes direction of travel still needed to reach target.
        let initial_distance = first.position - first.goto_target;

        while !self.runtime.status.stopped() {
            sleep(self.poll_interval).await;
            let snapshot = *self.refresh().await?;
            let distance = snapshot.position - snapshot.goto_target;

            if !snapshot.status.tracking() {
                if initial_distance * distance <= 0 {
                    // Overshot the target or moving the wrong way.
                    warn!("AXIS{}: distance sign flipped, stopping", self.axis);
                    self.transport
                        .send_command(Command::SoftStop, self.axis, None)
                        .await?;
                }
                if distance.abs() > initial_distance.abs() {
                    warn!("AXIS{}: moving away from target, hard stop", self.axis);
                    self.transport
                        .send_command(Command::HardStop, self.axis, None)
                        .await?;
                }
            }
        }
        info!("AXIS{}: stopped", self.axis);
        Ok(())
    }
}

fn bias(counts: i64) -> u32 {
    (counts + POSITION_BIAS) as u32
}
