//! Device discovery coordination.
//!
//! Platform scanning lives behind [`ScanSource`]; this module owns the
//! acceptance policy layered on top of it: a name-prefix allow-list,
//! de-duplication by address, and a stop condition of target-count-reached
//! or timeout, whichever comes first. The scan loop is the single owner of
//! stop handling, so the pending timeout can never fire a second stop after
//! a count-based one.

use crate::capability::{Device, ScanSource};
use crate::error::ScanError;
use crate::statuslog::StatusLog;
use std::time::Duration;

pub const DEFAULT_NAME_PREFIX: &str = "Polar";
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub name_prefix: String,
    pub target_count: usize,
    pub timeout: Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            target_count: 2,
            timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

/// Runs one scan to completion and returns the accepted devices.
///
/// `stop_scan` is issued exactly once, after the loop has concluded for
/// whichever reason came first.
pub async fn run_scan(
    source: &dyn ScanSource,
    policy: &ScanPolicy,
    notices: &StatusLog,
) -> Result<Vec<Device>, ScanError> {
    notices.info(format!(
        "Starting scan ({} ms or {} device(s))...",
        policy.timeout.as_millis(),
        policy.target_count
    ));
    let mut discovered = source.start_scan().await?;

    let mut found: Vec<Device> = Vec::new();
    let deadline = tokio::time::sleep(policy.timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            maybe_device = discovered.recv() => match maybe_device {
                Some(device) => {
                    if !name_matches(&device.name, &policy.name_prefix) {
                        continue;
                    }
                    if found.iter().any(|d| d.address == device.address) {
                        continue;
                    }
                    notices.info(format!("Found device: {}", device.name));
                    found.push(device);
                    if found.len() >= policy.target_count {
                        notices.info(format!(
                            "Found {} matching device(s). Stopping scan.",
                            found.len()
                        ));
                        break;
                    }
                }
                None => break,
            },
            _ = &mut deadline => {
                notices.info(format!("Scan timeout ({} ms) reached.", policy.timeout.as_millis()));
                break;
            }
        }
    }

    source.stop_scan().await;
    Ok(found)
}

/// Maps scan results onto participant slots: first device to slot 1, second
/// to slot 2. A device sharing slot 1's address is never assigned twice.
pub fn assign_slots(devices: &[Device]) -> (Option<Device>, Option<Device>) {
    let first = devices.first().cloned();
    let second = devices
        .get(1)
        .filter(|d| first.as_ref().map(|f| f.address != d.address).unwrap_or(true))
        .cloned();
    (first, second)
}

fn name_matches(name: &str, prefix: &str) -> bool {
    name.len() >= prefix.len()
        && name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
