//! # Device Link Module
//!
//! One `DeviceLink` per participant slot owns that device's connection
//! lifecycle and turns raw notifications into decoded frames.
//!
//! ## Key Components
//! - `DeviceLink`: command loop running on its own thread with its own Tokio
//!   runtime, so device I/O never blocks the caller
//! - `LinkCommand`: commands sent from the control path (connect/disconnect)
//! - `LinkEvent`: ordered outbound stream of state transitions and frames
//!
//! Connection progress is delivered as state-change events, never as return
//! values. A failure at any stage moves the link to `Error` with a single
//! attempt and no retry; `Disconnect` from any state ends in `Disconnected`
//! and releases the device handle. Two links share no mutable state.

use crate::capability::{Device, HrCentral};
use crate::frame::{self, DecodedFrame};
use crate::layout::Slot;
use crate::statuslog::StatusLog;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Connection lifecycle of one device slot.
///
/// Transitions follow Disconnected → Connecting → Connected →
/// ServiceDiscovery → Subscribed, with Error reachable from any in-progress
/// stage and Disconnected reachable from everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ServiceDiscovery,
    Subscribed,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::ServiceDiscovery => "Service discovery",
            ConnectionState::Subscribed => "Subscribed",
            ConnectionState::Error => "Error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub enum LinkCommand {
    Connect(Device),
    Disconnect,
}

/// Outbound event from a link worker, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    State { slot: Slot, state: ConnectionState },
    Frame { slot: Slot, frame: DecodedFrame },
}

/// Owns one slot's connection state machine.
///
/// Runs in a dedicated thread with its own Tokio runtime and processes
/// connection commands, mirroring the split between the control path and
/// the asynchronous device capability.
pub struct DeviceLink {
    slot: Slot,
    central: Arc<dyn HrCentral>,
    command_receiver: mpsc::Receiver<LinkCommand>,
    event_sender: Sender<LinkEvent>,
    notices: StatusLog,
}

impl DeviceLink {
    /// Creates a link for `slot`. Returns the link and the sender for
    /// issuing commands from the control path.
    pub fn new(
        slot: Slot,
        central: Arc<dyn HrCentral>,
        event_sender: Sender<LinkEvent>,
        notices: StatusLog,
    ) -> (Self, Sender<LinkCommand>) {
        let (command_sender, command_receiver) = mpsc::channel();
        let link = DeviceLink {
            slot,
            central,
            command_receiver,
            event_sender,
            notices,
        };
        (link, command_sender)
    }

    /// Runs the command loop. Call from a spawned thread; blocks until the
    /// command channel closes.
    pub fn run(self) {
        let rt = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                self.notices.error(format!(
                    "[{}] Failed to create async runtime: {}",
                    self.slot.label(),
                    e
                ));
                send_state(&self.event_sender, self.slot, ConnectionState::Error);
                return;
            }
        };

        let mut stop_flag: Option<Arc<AtomicBool>> = None;

        while let Ok(command) = self.command_receiver.recv() {
            match command {
                LinkCommand::Connect(device) => {
                    log::info!("[{}] connect requested: {}", self.slot.label(), device.address);
                    // Tear down any previous attempt before starting anew
                    if let Some(flag) = stop_flag.take() {
                        flag.store(true, Ordering::Relaxed);
                    }
                    let should_stop = Arc::new(AtomicBool::new(false));
                    stop_flag = Some(should_stop.clone());

                    rt.spawn(drive_link(
                        self.slot,
                        self.central.clone(),
                        device,
                        self.event_sender.clone(),
                        self.notices.clone(),
                        should_stop,
                    ));
                }
                LinkCommand::Disconnect => {
                    log::info!("[{}] disconnect requested", self.slot.label());
                    match stop_flag.take() {
                        Some(flag) => flag.store(true, Ordering::Relaxed),
                        // No worker to wind down; report the terminal state
                        // directly so disconnect stays idempotent.
                        None => send_state(
                            &self.event_sender,
                            self.slot,
                            ConnectionState::Disconnected,
                        ),
                    }
                }
            }
        }

        if let Some(flag) = stop_flag {
            flag.store(true, Ordering::Relaxed);
        }
        log::info!("[{}] command channel closed, shutting down", self.slot.label());
    }
}

fn send_state(events: &Sender<LinkEvent>, slot: Slot, state: ConnectionState) {
    let _ = events.send(LinkEvent::State { slot, state });
}

/// Drives one connection attempt end to end: connect, discover, subscribe,
/// stream, disconnect. Emits every state transition on `events`.
async fn drive_link(
    slot: Slot,
    central: Arc<dyn HrCentral>,
    device: Device,
    events: Sender<LinkEvent>,
    notices: StatusLog,
    should_stop: Arc<AtomicBool>,
) {
    send_state(&events, slot, ConnectionState::Connecting);
    notices.info(format!(
        "[{}] Connecting to {} ({})...",
        slot.label(),
        device.name,
        device.address
    ));

    let mut peripheral = match central.connect(&device.address).await {
        Ok(peripheral) => peripheral,
        Err(e) => {
            notices.error(format!("[{}] {}", slot.label(), e));
            send_state(&events, slot, ConnectionState::Error);
            wait_for_stop(&should_stop).await;
            send_state(&events, slot, ConnectionState::Disconnected);
            return;
        }
    };

    if should_stop.load(Ordering::Relaxed) {
        peripheral.disconnect().await;
        send_state(&events, slot, ConnectionState::Disconnected);
        return;
    }

    send_state(&events, slot, ConnectionState::Connected);
    notices.info(format!(
        "[{}] Connected to {}. Discovering services...",
        slot.label(),
        device.address
    ));

    if let Err(e) = peripheral.discover_hr_service().await {
        notices.error(format!("[{}] {}", slot.label(), e));
        send_state(&events, slot, ConnectionState::Error);
        wait_for_stop(&should_stop).await;
        peripheral.disconnect().await;
        send_state(&events, slot, ConnectionState::Disconnected);
        return;
    }
    send_state(&events, slot, ConnectionState::ServiceDiscovery);

    let mut notifications = match peripheral.subscribe_hr().await {
        Ok(stream) => stream,
        Err(e) => {
            notices.error(format!("[{}] {}", slot.label(), e));
            send_state(&events, slot, ConnectionState::Error);
            wait_for_stop(&should_stop).await;
            peripheral.disconnect().await;
            send_state(&events, slot, ConnectionState::Disconnected);
            return;
        }
    };
    send_state(&events, slot, ConnectionState::Subscribed);
    notices.info(format!(
        "[{}] Subscribed to heart-rate notifications.",
        slot.label()
    ));

    loop {
        tokio::select! {
            maybe_notification = notifications.recv() => match maybe_notification {
                Some(notification) => {
                    match frame::decode(&notification.bytes, notification.arrival_ms) {
                        Ok(frame) => {
                            let _ = events.send(LinkEvent::Frame { slot, frame });
                        }
                        Err(e) => {
                            notices.error(format!("[{}] Dropped notification: {}", slot.label(), e));
                        }
                    }
                }
                None => {
                    notices.info(format!("[{}] Notification stream ended.", slot.label()));
                    break;
                }
            },
            _ = wait_for_stop(&should_stop) => break,
        }
    }

    peripheral.disconnect().await;
    send_state(&events, slot, ConnectionState::Disconnected);
    notices.info(format!(
        "[{}] Disconnected from {}.",
        slot.label(),
        device.address
    ));
}

async fn wait_for_stop(flag: &AtomicBool) {
    loop {
        if flag.load(Ordering::Relaxed) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
