//! Request/response transport.
//!
//! The protocol is half-duplex with no correlation id, so at most one
//! command may be in flight; a `tokio::sync::Mutex` enforces that rather
//! than merely documenting it.

#![allow(async_fn_in_trait)]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::codec::{self, ReplyData};
use crate::command::{AxisId, Command, PayloadWidth};
use crate::config::MountConfig;
use crate::error::{Error, Result};

const REPLY_BUFFER: usize = 1024;

/// One send/receive exchange on the underlying link. The UDP implementation
/// ships; a serial line fits behind the same seam.
pub trait Wire: Send {
    async fn exchange(&mut self, frame: &[u8]) -> io::Result<Vec<u8>>;
}

/// Connected UDP datagram link to the motor controller.
pub struct UdpWire {
    socket: UdpSocket,
}

impl UdpWire {
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        info!("UDP target {host}:{port}");
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((host, port)).await?;
        Ok(UdpWire { socket })
    }
}

impl Wire for UdpWire {
    async fn exchange(&mut self, frame: &[u8]) -> io::Result<Vec<u8>> {
        self.socket.send(frame).await?;
        let mut buf = [0u8; REPLY_BUFFER];
        let n = self.socket.recv(&mut buf).await?;
        Ok(buf[..n].to_vec())
    }
}

/// Owns the link for the process lifetime and serializes every command
/// through it.
#[derive(Debug)]
pub struct Transport<W: Wire> {
    wire: Mutex<W>,
    reply_timeout: Duration,
    comm_ok: AtomicBool,
}

impl<W: Wire> Transport<W> {
    pub fn new(wire: W, config: &MountConfig) -> Self {
        Transport {
            wire: Mutex::new(wire),
            reply_timeout: config.reply_timeout,
            comm_ok: AtomicBool::new(false),
        }
    }

    /// Whether the last exchange got an answer in time.
    pub fn comm_ok(&self) -> bool {
        self.comm_ok.load(Ordering::SeqCst)
    }

    /// Send one command and wait for its reply. `data` must be present
    /// exactly when the command carries a payload.
    pub async fn send_command(
        &self,
        cmd: Command,
        axis: AxisId,
        data: Option<u32>,
    ) -> Result<ReplyData> {
        let width = cmd.payload_width();
        debug_assert_eq!(
            data.is_some(),
            width != PayloadWidth::Empty,
            "payload mismatch for {cmd:?}"
        );
        let payload = match data {
            Some(value) => codec::encode(value, width),
            None => String::new(),
        };
        let frame = codec::build_frame(cmd.code(), axis, &payload);

        let raw = self.exchange_raw(&frame).await?;
        codec::parse_reply(&raw)
    }

    /// Send the fixed "is initialized" inquiry on both channels and report
    /// connectivity without raising.
    pub async fn test_comm(&self) -> bool {
        info!("testing comms, asking if initialized");
        match self.exchange_raw(b":F3\r").await {
            Ok(raw) if raw == b"=\r" => {
                info!("mount initialized, connection OK");
                true
            }
            Ok(raw) => {
                info!("mount not initialized, connection FAIL ({raw:?})");
                false
            }
            Err(e) => {
                warn!("comm test failed: {e}");
                false
            }
        }
    }

    async fn exchange_raw(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let mut wire = self.wire.lock().await;
        debug!("sending cmd {:?}", String::from_utf8_lossy(frame));

        match tokio::time::timeout(self.reply_timeout, wire.exchange(frame)).await {
            Ok(Ok(raw)) => {
                self.comm_ok.store(true, Ordering::SeqCst);
                debug!("response {:?}", String::from_utf8_lossy(&raw));
                Ok(raw)
            }
            Ok(Err(e)) => {
                self.comm_ok.store(false, Ordering::SeqCst);
                Err(Error::Io(e))
            }
            Err(_) => {
                self.comm_ok.store(false, Ordering::SeqCst);
                debug!("socket timeout, {:?} without response", self.reply_timeout);
                Err(Error::Timeout(self.reply_timeout))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted mount double used across the crate's tests.

    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    use crate::codec;
    use crate::command::PayloadWidth;

    use super::Wire;

    /// Mutable mount-side state the simulator answers from.
    pub struct SimState {
        /// Replies to `j`, one per poll; the last one repeats.
        pub positions: VecDeque<i64>,
        /// Replies to `f`, one per poll; the last one repeats.
        pub statuses: VecDeque<&'static str>,
        pub goto_target: i64,
        pub step_period: u32,
        pub counts_per_revolution: u32,
        /// Separate value for axis 2, so single-axis variants can be played.
        pub counts_per_revolution_axis2: u32,
        pub timer_interrupt_freq: u32,
        pub motor_board_version: u32,
        pub high_speed_ratio: u32,
        pub last_position: i64,
        pub last_status: &'static str,
    }

    impl Default for SimState {
        fn default() -> Self {
            SimState {
                positions: VecDeque::new(),
                statuses: VecDeque::new(),
                goto_target: 0,
                step_period: 10,
                counts_per_revolution: 9024000,
                counts_per_revolution_axis2: 9024000,
                timer_interrupt_freq: 64935,
                motor_board_version: 0x0210,
                high_speed_ratio: 32,
                last_position: 0,
                last_status: "000",
            }
        }
    }

    /// In-memory [`Wire`] that plays the motor controller. Every frame it
    /// sees is appended to `sent` for later assertions.
    #[derive(Clone)]
    pub struct SimWire {
        pub sent: Arc<Mutex<Vec<String>>>,
        pub state: Arc<Mutex<SimState>>,
    }

    impl SimWire {
        pub fn new(state: SimState) -> Self {
            SimWire {
                sent: Arc::new(Mutex::new(Vec::new())),
                state: Arc::new(Mutex::new(state)),
            }
        }

        pub fn sent_frames(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        /// Opcodes of the non-inquiry commands seen so far.
        pub fn sent_opcodes(&self) -> Vec<char> {
            self.sent_frames()
                .iter()
                .filter_map(|frame| frame.chars().nth(1))
                .filter(|c| c.is_ascii_uppercase())
                .collect()
        }

        fn reply_value(value: u32, width: PayloadWidth) -> Vec<u8> {
            format!("={}\r", codec::encode(value, width)).into_bytes()
        }
    }

    impl Wire for SimWire {
        async fn exchange(&mut self, frame: &[u8]) -> io::Result<Vec<u8>> {
            let text = String::from_utf8_lossy(frame).to_string();
            self.sent.lock().unwrap().push(text.clone());

            let opcode = text.chars().nth(1).expect("empty frame");
            let mut state = self.state.lock().unwrap();
            let reply = match opcode {
                'j' => {
                    if let Some(p) = state.positions.pop_front() {
                        state.last_position = p;
                    }
                    let biased = (state.last_position + 0x80_0000) as u32;
                    Self::reply_value(biased, PayloadWidth::Six)
                }
                'h' => {
                    let biased = (state.goto_target + 0x80_0000) as u32;
                    Self::reply_value(biased, PayloadWidth::Six)
                }
                'i' => Self::reply_value(state.step_period, PayloadWidth::Six),
                'f' => {
                    if let Some(s) = state.statuses.pop_front() {
                        state.last_status = s;
                    }
                    format!("={}\r", state.last_status).into_bytes()
                }
                'a' => {
                    let cpr = if text.chars().nth(2) == Some('2') {
                        state.counts_per_revolution_axis2
                    } else {
                        state.counts_per_revolution
                    };
                    Self::reply_value(cpr, PayloadWidth::Six)
                }
                'b' => Self::reply_value(state.timer_interrupt_freq, PayloadWidth::Six),
                'e' => Self::reply_value(state.motor_board_version, PayloadWidth::Six),
                'g' => Self::reply_value(state.high_speed_ratio, PayloadWidth::Six),
                'S' | 'E' => {
                    let payload = text[3..text.len() - 1].to_string();
                    let value = match codec::decode(&payload).unwrap() {
                        codec::ReplyData::Value(v) => v,
                        other => panic!("bad {opcode} payload {other:?}"),
                    };
                    let debiased = value as i64 - 0x80_0000;
                    if opcode == 'S' {
                        state.goto_target = debiased;
                    } else {
                        state.last_position = debiased;
                    }
                    b"=\r".to_vec()
                }
                _ => b"=\r".to_vec(),
            };
            Ok(reply)
        }
    }

    /// A wire that never answers; used for timeout tests.
    #[derive(Debug)]
    pub struct SilentWire;

    impl Wire for SilentWire {
        async fn exchange(&mut self, _frame: &[u8]) -> io::Result<Vec<u8>> {
            std::future::pending().await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::{SilentWire, SimState, SimWire};
    use super::Transport;
    use crate::codec::ReplyData;
    use crate::command::{AxisId, Command};
    use crate::config::MountConfig;
    use crate::error::Error;

    #[tokio::test]
    async fn inquiry_round_trip() {
        let wire = SimWire::new(SimState {
            step_period: 0x123456,
            ..SimState::default()
        });
        let transport = Transport::new(wire.clone(), &MountConfig::default());

        let reply = transport
            .send_command(Command::InquireStepPeriod, AxisId::One, None)
            .await
            .unwrap();
        assert_eq!(reply, ReplyData::Value(0x123456));
        assert_eq!(wire.sent_frames(), vec![":i1\r".to_string()]);
        assert!(transport.comm_ok());
    }

    #[tokio::test]
    async fn set_command_encodes_payload() {
        let wire = SimWire::new(SimState::default());
        let transport = Transport::new(wire.clone(), &MountConfig::default());

        transport
            .send_command(Command::SetGotoTarget, AxisId::Two, Some(0x89_ABCD))
            .await
            .unwrap();
        assert_eq!(wire.sent_frames(), vec![":S2CDAB89\r".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_clears_health_flag() {
        let config = MountConfig {
            reply_timeout: Duration::from_secs(2),
            ..MountConfig::default()
        };
        let transport = Transport::new(SilentWire, &config);

        let err = transport
            .send_command(Command::InquireStatus, AxisId::One, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(t) if t == Duration::from_secs(2)));
        assert!(!transport.comm_ok());
    }

    #[tokio::test]
    async fn test_comm_reports_without_raising() {
        let wire = SimWire::new(SimState::default());
        let transport = Transport::new(wire.clone(), &MountConfig::default());

        assert!(transport.test_comm().await);
        assert_eq!(wire.sent_frames(), vec![":F3\r".to_string()]);
    }
}
