//! Two-axis facade over a pair of [`AxisController`]s.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::axis::AxisController;
use crate::command::{AxisId, Command};
use crate::config::MountConfig;
use crate::error::Result;
use crate::params::AxisParameters;
use crate::transport::{Transport, UdpWire, Wire};

/// A connected, initialized two-axis mount. Axis 1 is azimuth, axis 2 is
/// altitude on a stock alt-az mount; the facade only forwards angles.
///
/// Per-axis steps run sequentially, never concurrently: the board expects
/// stop-before-reconfigure ordering on each channel and the protocol has no
/// way to interleave safely.
#[derive(Debug)]
pub struct Mount<W: Wire> {
    transport: Arc<Transport<W>>,
    axis1: AxisController<W>,
    axis2: AxisController<W>,
}

impl Mount<UdpWire> {
    /// Open the UDP link and initialize both axes.
    pub async fn connect(config: &MountConfig) -> Result<Self> {
        let wire = UdpWire::connect(&config.host, config.port).await?;
        let transport = Arc::new(Transport::new(wire, config));
        Self::initialize(transport, config).await
    }
}

impl<W: Wire> Mount<W> {
    /// Fetch the per-axis parameters and mark both axes initialized,
    /// retrying the whole sequence with a fixed backoff. A mount that is
    /// still powering up simply answers late, so by default this blocks
    /// until it does; `init_max_attempts` bounds the loop.
    pub async fn initialize(transport: Arc<Transport<W>>, config: &MountConfig) -> Result<Self> {
        let mut attempt: u32 = 0;
        let (params1, params2) = loop {
            match Self::fetch_parameters(&transport).await {
                Ok(params) => break params,
                Err(e) => {
                    attempt += 1;
                    if let Some(max) = config.init_max_attempts {
                        if attempt >= max {
                            warn!("initialization failed after {attempt} attempts");
                            return Err(e);
                        }
                    }
                    warn!(
                        "initialization failed ({e}), retrying in {:?}",
                        config.init_backoff
                    );
                    sleep(config.init_backoff).await;
                }
            }
        };

        Ok(Mount {
            axis1: AxisController::new(transport.clone(), AxisId::One, params1, config),
            axis2: AxisController::new(transport.clone(), AxisId::Two, params2, config),
            transport,
        })
    }

    async fn fetch_parameters(
        transport: &Transport<W>,
    ) -> Result<(AxisParameters, AxisParameters)> {
        let params1 = AxisParameters::inquire(transport, AxisId::One).await?;
        let params2 = AxisParameters::inquire(transport, AxisId::Two).await?;
        Ok((params1, params2))
    }

    pub fn transport(&self) -> &Transport<W> {
        &self.transport
    }

    pub fn axis(&self, id: AxisId) -> &AxisController<W> {
        match id {
            AxisId::One => &self.axis1,
            AxisId::Two => &self.axis2,
        }
    }

    pub fn axis_mut(&mut self, id: AxisId) -> &mut AxisController<W> {
        match id {
            AxisId::One => &mut self.axis1,
            AxisId::Two => &mut self.axis2,
        }
    }

    /// Slew both axes to the given angles. Axes absent on the hardware are
    /// silently skipped. With `synchronous`, wait for both to stop.
    pub async fn goto_alt_az(&mut self, az: f64, alt: f64, synchronous: bool) -> Result<()> {
        info!("GOTO axis1={az} axis2={alt} degrees");
        self.axis1.goto_degrees(az).await?;
        self.axis2.goto_degrees(alt).await?;
        if synchronous {
            self.axis1.wait_to_stop().await?;
            self.axis2.wait_to_stop().await?;
        }
        Ok(())
    }

    /// Track both axes at the given angular speeds, degrees per second.
    pub async fn track_alt_az(&mut self, az_speed: f64, alt_speed: f64) -> Result<()> {
        info!("TRACK speeds axis1={az_speed} axis2={alt_speed} degrees per second");
        self.axis1.track_degrees_per_second(az_speed).await?;
        self.axis2.track_degrees_per_second(alt_speed).await?;
        Ok(())
    }

    /// Tell the mount where it is currently pointed, without motion.
    pub async fn set_position(&mut self, az: f64, alt: f64) -> Result<()> {
        self.axis1.sync_position(az).await?;
        self.axis2.sync_position(alt).await?;
        Ok(())
    }

    /// Drive the auxiliary output (camera shutter on most mounts).
    /// Independent of axis state.
    pub async fn set_aux_switch(&self, on: bool) -> Result<()> {
        info!("auxiliary switch: {on}");
        self.transport
            .send_command(Command::SetAuxSwitch, AxisId::One, Some(on as u32))
            .await?;
        Ok(())
    }

    /// Poll fresh runtime snapshots for both axes.
    pub async fn refresh(&mut self) -> Result<()> {
        self.axis1.refresh().await?;
        self.axis2.refresh().await?;
        Ok(())
    }
}
