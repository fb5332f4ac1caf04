//! Decoding of the 12-bit axis status word (`f` inquiry).

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags!(
    /// Raw status bits. The three reply digits map to bits 11..8, 7..4 and
    /// 3..0 in order of arrival.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusBits: u16 {
        const TRACKING      = 0x100;
        const CCW           = 0x200;
        const FAST_SPEED    = 0x400;
        const RUNNING       = 0x010;
        const BLOCKED       = 0x020;
        const NOT_INIT      = 0x001;
        const LEVEL_SWITCH  = 0x002;
    }
);

/// Snapshot of one axis status, derived fresh on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisStatus {
    bits: StatusBits,
    /// Forced on for axes the mount variant does not populate.
    blocked_override: bool,
}

impl AxisStatus {
    /// Parse the three raw hex digits of an `f` reply.
    pub fn from_reply(triplet: &str) -> Result<Self> {
        if triplet.len() != 3 || !triplet.is_ascii() {
            return Err(Error::decode(format!("bad status word {triplet:?}")));
        }
        let mut word = 0u16;
        for ch in triplet.chars() {
            let nibble = ch
                .to_digit(16)
                .ok_or_else(|| Error::decode(format!("bad status word {triplet:?}")))?;
            word = word << 4 | nibble as u16;
        }
        Ok(AxisStatus {
            bits: StatusBits::from_bits_truncate(word),
            blocked_override: false,
        })
    }

    pub fn bits(&self) -> StatusBits {
        self.bits
    }

    /// Mark the axis blocked regardless of what the word says. Used for
    /// axes absent on the mount variant.
    pub fn with_blocked(mut self) -> Self {
        self.blocked_override = true;
        self
    }

    pub fn tracking(&self) -> bool {
        self.bits.contains(StatusBits::TRACKING)
    }

    pub fn ccw(&self) -> bool {
        self.bits.contains(StatusBits::CCW)
    }

    pub fn fast_speed(&self) -> bool {
        self.bits.contains(StatusBits::FAST_SPEED)
    }

    pub fn stopped(&self) -> bool {
        !self.bits.contains(StatusBits::RUNNING)
    }

    pub fn blocked(&self) -> bool {
        self.blocked_override || self.bits.contains(StatusBits::BLOCKED)
    }

    /// The init bit reads 0 once initialization is done on the firmware
    /// this driver was validated against, despite what the vendor PDF says.
    pub fn init_done(&self) -> bool {
        !self.bits.contains(StatusBits::NOT_INIT)
    }

    pub fn level_switch_on(&self) -> bool {
        self.bits.contains(StatusBits::BLOCKED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_idle_axis() {
        // All zeros: goto mode, CW, slow, stopped, init done.
        let status = AxisStatus::from_reply("000").unwrap();
        assert!(status.stopped());
        assert!(!status.tracking());
        assert!(!status.ccw());
        assert!(!status.fast_speed());
        assert!(!status.blocked());
        assert!(status.init_done());
    }

    #[test]
    fn running_tracking_ccw() {
        // digit1 = tracking|ccw, digit2 = running.
        let status = AxisStatus::from_reply("310").unwrap();
        assert!(!status.stopped());
        assert!(status.tracking());
        assert!(status.ccw());
    }

    #[test]
    fn fast_goto_running() {
        let status = AxisStatus::from_reply("410").unwrap();
        assert!(status.fast_speed());
        assert!(!status.tracking());
        assert!(!status.stopped());
    }

    #[test]
    fn blocked_and_level_switch_share_a_bit() {
        let status = AxisStatus::from_reply("020").unwrap();
        assert!(status.blocked());
        assert!(status.level_switch_on());
        assert!(status.stopped());
    }

    #[test]
    fn not_initialized() {
        let status = AxisStatus::from_reply("001").unwrap();
        assert!(!status.init_done());
    }

    #[test]
    fn absent_axis_reads_blocked() {
        let status = AxisStatus::from_reply("000").unwrap().with_blocked();
        assert!(status.blocked());
        assert!(!status.level_switch_on());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(AxisStatus::from_reply("0G0").is_err());
        assert!(AxisStatus::from_reply("00").is_err());
    }
}
