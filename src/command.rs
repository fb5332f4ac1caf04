//! The fixed command vocabulary of the SynScan motor controller and the
//! motion-mode bit packing.
//!
//! Reference:
//! <https://inter-static.skywatcher.com/downloads/skywatcher_motor_controller_command_set.pdf>

use serde::{Deserialize, Serialize};

/// One of the two motor channels. Axis 1 drives azimuth / right ascension,
/// axis 2 drives altitude / declination on a stock mount, but the driver
/// itself only ever sees axis angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisId {
    One,
    Two,
}

impl AxisId {
    pub const BOTH: [AxisId; 2] = [AxisId::One, AxisId::Two];

    /// Channel digit as it appears on the wire.
    pub fn digit(self) -> char {
        match self {
            AxisId::One => '1',
            AxisId::Two => '2',
        }
    }
}

impl std::fmt::Display for AxisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digit())
    }
}

/// Payload widths the protocol allows. Every command carries exactly one of
/// these; anything else cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadWidth {
    Empty,
    One,
    Two,
    Four,
    Six,
}

impl PayloadWidth {
    pub fn digits(self) -> usize {
        match self {
            PayloadWidth::Empty => 0,
            PayloadWidth::One => 1,
            PayloadWidth::Two => 2,
            PayloadWidth::Four => 4,
            PayloadWidth::Six => 6,
        }
    }
}

/// Commands spoken by this driver. The letter is the wire opcode; the
/// payload width is fixed per command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `F` - mark axis initialization done.
    InitializationDone,
    /// `G` - set motion mode (see [`MotionMode`]).
    SetMotionMode,
    /// `I` - set step period (T1 preset value).
    SetStepPeriod,
    /// `S` - set goto target, biased counts.
    SetGotoTarget,
    /// `H` - set goto target increment, biased counts.
    SetGotoTargetIncrement,
    /// `M` - set break point increment.
    SetBreakPointIncrement,
    /// `E` - set axis position, biased counts.
    SetAxisPosition,
    /// `J` - start motion.
    StartMotion,
    /// `K` - soft stop (ramps down, then channel returns to tracking mode).
    SoftStop,
    /// `L` - instant stop.
    HardStop,
    /// `O` - switch the auxiliary output on or off.
    SetAuxSwitch,
    /// `h` - inquire goto target position.
    InquireGotoTarget,
    /// `j` - inquire position.
    InquirePosition,
    /// `i` - inquire step period.
    InquireStepPeriod,
    /// `f` - inquire status.
    InquireStatus,
    /// `a` - inquire counts per revolution.
    InquireCountsPerRevolution,
    /// `b` - inquire timer interrupt frequency.
    InquireTimerInterruptFreq,
    /// `e` - inquire motor board version.
    InquireMotorBoardVersion,
    /// `g` - inquire high speed ratio.
    InquireHighSpeedRatio,
}

impl Command {
    pub fn code(self) -> char {
        match self {
            Command::InitializationDone => 'F',
            Command::SetMotionMode => 'G',
            Command::SetStepPeriod => 'I',
            Command::SetGotoTarget => 'S',
            Command::SetGotoTargetIncrement => 'H',
            Command::SetBreakPointIncrement => 'M',
            Command::SetAxisPosition => 'E',
            Command::StartMotion => 'J',
            Command::SoftStop => 'K',
            Command::HardStop => 'L',
            Command::SetAuxSwitch => 'O',
            Command::InquireGotoTarget => 'h',
            Command::InquirePosition => 'j',
            Command::InquireStepPeriod => 'i',
            Command::InquireStatus => 'f',
            Command::InquireCountsPerRevolution => 'a',
            Command::InquireTimerInterruptFreq => 'b',
            Command::InquireMotorBoardVersion => 'e',
            Command::InquireHighSpeedRatio => 'g',
        }
    }

    pub fn payload_width(self) -> PayloadWidth {
        match self {
            Command::SetMotionMode => PayloadWidth::Two,
            Command::SetStepPeriod
            | Command::SetGotoTarget
            | Command::SetGotoTargetIncrement
            | Command::SetBreakPointIncrement
            | Command::SetAxisPosition => PayloadWidth::Six,
            Command::SetAuxSwitch => PayloadWidth::One,
            _ => PayloadWidth::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

/// Motion mode byte sent with `G`. One hex digit of mode bits, one of
/// direction bits; a two-digit payload is a single group on the wire, so no
/// nibble swap applies.
///
/// The channel always falls back to tracking mode once the motor stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionMode {
    Goto { direction: Direction, fast: bool },
    Tracking { direction: Direction, fast: bool },
}

impl MotionMode {
    /// Pack into the wire byte. The speed bit is inverted between the two
    /// modes, and the direction bit is set for clockwise goto but for
    /// counter-clockwise tracking; both quirks are firmware-validated
    /// behavior, not typos.
    pub fn to_byte(self) -> u8 {
        match self {
            MotionMode::Goto { direction, fast } => {
                let slow = !fast as u8;
                let cw = (direction == Direction::Clockwise) as u8;
                slow << 5 | cw
            }
            MotionMode::Tracking { direction, fast } => {
                let ccw = (direction == Direction::CounterClockwise) as u8;
                0x10 | (fast as u8) << 5 | ccw
            }
        }
    }

    pub fn is_tracking(self) -> bool {
        matches!(self, MotionMode::Tracking { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_goto_packs_direction_only() {
        let cw = MotionMode::Goto {
            direction: Direction::Clockwise,
            fast: true,
        };
        let ccw = MotionMode::Goto {
            direction: Direction::CounterClockwise,
            fast: true,
        };
        assert_eq!(cw.to_byte(), 0x01);
        assert_eq!(ccw.to_byte(), 0x00);
    }

    #[test]
    fn slow_goto_sets_speed_bit() {
        let mode = MotionMode::Goto {
            direction: Direction::Clockwise,
            fast: false,
        };
        assert_eq!(mode.to_byte(), 0x21);
    }

    #[test]
    fn tracking_packs_mode_and_direction() {
        let slow_ccw = MotionMode::Tracking {
            direction: Direction::CounterClockwise,
            fast: false,
        };
        let fast_cw = MotionMode::Tracking {
            direction: Direction::Clockwise,
            fast: true,
        };
        assert_eq!(slow_ccw.to_byte(), 0x11);
        assert_eq!(fast_cw.to_byte(), 0x30);
    }

    #[test]
    fn payload_widths_match_vocabulary() {
        assert_eq!(Command::SetMotionMode.payload_width(), PayloadWidth::Two);
        assert_eq!(Command::SetGotoTarget.payload_width(), PayloadWidth::Six);
        assert_eq!(Command::SetAuxSwitch.payload_width(), PayloadWidth::One);
        assert_eq!(Command::StartMotion.payload_width(), PayloadWidth::Empty);
        assert_eq!(
            Command::InquireCountsPerRevolution.payload_width(),
            PayloadWidth::Empty
        );
    }
}
