//! Per-axis physical constants, fetched once at connection time.

use tracing::info;

use crate::command::{AxisId, Command};
use crate::error::Result;
use crate::transport::{Transport, Wire};

/// Immutable-after-init motor board parameters. Every angle and speed
/// conversion depends on these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisParameters {
    /// Microsteps per full revolution. Zero means the axis does not exist
    /// on this mount variant and all motion on it is a no-op.
    pub counts_per_revolution: u32,
    /// Input clock of the T1 stepping timer, Hz.
    pub timer_interrupt_freq: u32,
    pub step_period: u32,
    pub motor_board_version: u32,
    pub high_speed_ratio: u32,
}

impl AxisParameters {
    /// Issue the five parameter inquiries for one axis, then mark the axis
    /// initialized (`F`), which some firmware variants require before they
    /// accept motion commands.
    pub async fn inquire<W: Wire>(transport: &Transport<W>, axis: AxisId) -> Result<Self> {
        let counts_per_revolution = transport
            .send_command(Command::InquireCountsPerRevolution, axis, None)
            .await?
            .value()?;
        let timer_interrupt_freq = transport
            .send_command(Command::InquireTimerInterruptFreq, axis, None)
            .await?
            .value()?;
        let step_period = transport
            .send_command(Command::InquireStepPeriod, axis, None)
            .await?
            .value()?;
        let motor_board_version = transport
            .send_command(Command::InquireMotorBoardVersion, axis, None)
            .await?
            .value()?;
        let high_speed_ratio = transport
            .send_command(Command::InquireHighSpeedRatio, axis, None)
            .await?
            .value()?;

        transport
            .send_command(Command::InitializationDone, axis, None)
            .await?;

        let params = AxisParameters {
            counts_per_revolution,
            timer_interrupt_freq,
            step_period,
            motor_board_version,
            high_speed_ratio,
        };
        info!("AXIS{axis} parameters: {params:?}");
        Ok(params)
    }

    /// Whether this axis physically exists on the mount.
    pub fn present(&self) -> bool {
        self.counts_per_revolution != 0
    }

    /// Degrees (or deg/s) to counts (or counts/s). Zero for an absent axis.
    pub fn degrees_to_counts(&self, degrees: f64) -> f64 {
        if self.present() {
            degrees * self.counts_per_revolution as f64 / 360.0
        } else {
            0.0
        }
    }

    /// Counts (or counts/s) to degrees (or deg/s). Zero for an absent axis.
    pub fn counts_to_degrees(&self, counts: i64) -> f64 {
        if self.present() {
            counts as f64 * 360.0 / self.counts_per_revolution as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::MountConfig;
    use crate::transport::testing::{SimState, SimWire};

    #[tokio::test]
    async fn inquire_fetches_and_marks_initialized() {
        let wire = SimWire::new(SimState::default());
        let transport = Transport::new(wire.clone(), &MountConfig::default());

        let params = AxisParameters::inquire(&transport, AxisId::One).await.unwrap();
        assert_eq!(params.counts_per_revolution, 9024000);
        assert_eq!(params.timer_interrupt_freq, 64935);
        assert_eq!(params.high_speed_ratio, 32);
        assert!(params.present());

        assert_eq!(
            wire.sent_frames(),
            vec![":a1\r", ":b1\r", ":i1\r", ":e1\r", ":g1\r", ":F1\r"]
        );
    }

    #[test]
    fn conversions_round_trip() {
        let params = AxisParameters {
            counts_per_revolution: 9024000,
            ..AxisParameters::default()
        };
        let counts = params.degrees_to_counts(30.0);
        assert_relative_eq!(counts, 752000.0);
        assert_relative_eq!(params.counts_to_degrees(counts as i64), 30.0);
    }

    #[test]
    fn absent_axis_converts_to_zero() {
        let params = AxisParameters::default();
        assert!(!params.present());
        assert_eq!(params.degrees_to_counts(45.0), 0.0);
        assert_eq!(params.counts_to_degrees(1000), 0.0);
    }
}
