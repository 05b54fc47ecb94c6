//! BlueZ D-Bus backend for Victron advertisement scanning.
//!
//! Uses the `bluer` crate to talk to the BlueZ daemon via D-Bus. Requires
//! `bluetoothd` to be running.

use super::{
    RawFrame, ScanError, FRAME_CHANNEL_BUFFER_SIZE, MANUFACTURER_DATA_TYPE,
    VICTRON_MANUFACTURER_ID, VICTRON_MANUFACTURER_ID_BYTES,
};
use crate::mac_address::MacAddress;
use bluer::monitor::{Monitor, MonitorEvent, Pattern};
use bluer::{Adapter, Address, Session};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Start scanning for Victron devices using the BlueZ D-Bus backend.
///
/// Initializes the default Bluetooth adapter and registers a passive
/// monitor for Victron manufacturer data. Discovered frames are sent
/// through the returned channel; the channel closes when the monitor event
/// stream ends, which the supervisor treats as a session failure.
pub async fn start_scan() -> Result<mpsc::Receiver<RawFrame>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_BUFFER_SIZE);

    // Filter for Victron manufacturer data at the controller level.
    let pattern = Pattern {
        data_type: MANUFACTURER_DATA_TYPE,
        start_position: 0,
        content: VICTRON_MANUFACTURER_ID_BYTES.to_vec(),
    };

    let monitor_manager = adapter.monitor().await?;
    let mut monitor_handle = monitor_manager
        .register(Monitor {
            patterns: Some(vec![pattern]),
            ..Default::default()
        })
        .await?;

    // Spawn a task that owns all Bluetooth state and runs the event loop.
    tokio::spawn(async move {
        let _session = session;
        let _monitor_manager = monitor_manager;

        while let Some(event) = monitor_handle.next().await {
            if let MonitorEvent::DeviceFound(device_id) = event {
                if let Err(e) = forward_frame(&adapter, device_id.device, &tx).await {
                    debug!("dropping advertisement: {e}");
                }
            }
        }
    });

    Ok(rx)
}

/// Read Victron manufacturer data from a discovered device and forward it
/// as a raw frame.
async fn forward_frame(
    adapter: &Adapter,
    address: Address,
    tx: &mpsc::Sender<RawFrame>,
) -> Result<(), ScanError> {
    let device = adapter.device(address)?;
    let mac: MacAddress = address.into();

    let manufacturer_data = match device.manufacturer_data().await? {
        Some(data) => data,
        None => return Ok(()), // No manufacturer data available
    };

    let data = match manufacturer_data.get(&VICTRON_MANUFACTURER_ID) {
        Some(data) => data,
        None => return Ok(()), // Not a Victron device
    };

    let _ = tx.send(RawFrame {
        mac,
        data: data.clone(),
    })
    .await;

    Ok(())
}
