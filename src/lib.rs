//! Driver for SkyWatcher mounts speaking the SynScan motor controller
//! protocol over UDP (the AZ-GTI and friends expose it on port 11880; the
//! same frames travel over a serial line).
//!
//! The stack, bottom up: [`codec`] turns values into the protocol's
//! nibble-group-reversed hex frames, [`transport`] exchanges one frame at a
//! time over the link with a timeout, [`params`] holds the per-axis motor
//! board constants fetched at connection time, [`axis`] sequences motion
//! commands for one channel, and [`mount`] composes the two channels into a
//! `goto`/`track`/`set_position` API in degrees.
//!
//! ```no_run
//! use synscan::{Mount, MountConfig};
//!
//! # async fn example() -> synscan::Result<()> {
//! let mut mount = Mount::connect(&MountConfig::default()).await?;
//! mount.set_position(0.0, 0.0).await?;
//! mount.goto_alt_az(30.0, 30.0, true).await?;
//! mount.track_alt_az(0.004178, 0.0).await?; // sidereal rate on azimuth
//! # Ok(())
//! # }
//! ```
//!
//! Reference:
//! <https://inter-static.skywatcher.com/downloads/skywatcher_motor_controller_command_set.pdf>

pub mod axis;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod mount;
pub mod params;
pub mod status;
pub mod transport;

pub use axis::{AxisController, AxisRuntime};
pub use command::{AxisId, Command, Direction, MotionMode};
pub use config::MountConfig;
pub use error::{Error, MountError, Result};
pub use mount::Mount;
pub use params::AxisParameters;
pub use status::AxisStatus;
pub use transport::{Transport, UdpWire, Wire};
