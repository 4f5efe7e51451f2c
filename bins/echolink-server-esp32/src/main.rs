//! Echolink server for ESP32.
//!
//! Boot sequence:
//! 1. Logger and peripherals
//! 2. Credentials from NVS, compiled defaults per missing key
//! 3. Heartbeat LED on GPIO17
//! 4. Wi-Fi station + connection service under the Link State Manager
//!
//! The main task then runs the manager's event loop for the life of the
//! device.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use echolink_core::credentials::verify_store;
use echolink_core::{
    load_station_credentials, AppConfig, LinkEventSender, LinkStateCell, LinkStateManager,
    Liveness,
};
use echolink_esp32::nvs::NvsCredentialStore;
use echolink_esp32::socket::LwipSocketTuning;
use echolink_esp32::watchdog::TaskWatchdog;
use echolink_esp32::wifi::EspStation;
use echolink_server::ConnectionService;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{Gpio17, Output, PinDriver};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

const HEARTBEAT_PERIOD: Duration = Duration::from_millis(500);
const HEARTBEAT_STACK_SIZE: usize = 4096;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Echolink ESP32 server starting...");

    let config = AppConfig::default();
    let peripherals = Peripherals::take().context("Peripherals already taken")?;
    let sysloop = EspSystemEventLoop::take().context("System event loop unavailable")?;
    let nvs_partition = EspDefaultNvsPartition::take().context("NVS partition unavailable")?;

    // Credentials
    let mut store = NvsCredentialStore::new(nvs_partition, &config.station.namespace);
    match verify_store(&mut store) {
        Ok(()) => info!("NVS self-test passed"),
        Err(e) => warn!("NVS self-test failed: {}", e),
    }
    let credentials = load_station_credentials(&store, &config.station);

    // Heartbeat
    let led = PinDriver::output(peripherals.pins.gpio17).context("GPIO17 unavailable")?;
    std::thread::Builder::new()
        .name("heartbeat".into())
        .stack_size(HEARTBEAT_STACK_SIZE)
        .spawn(move || heartbeat(led))
        .context("Failed to spawn heartbeat task")?;

    // Link State Manager
    let link = Arc::new(LinkStateCell::new());
    let (sender, events) = LinkEventSender::channel();
    let station = EspStation::new(peripherals.modem, sysloop, sender)
        .context("Wi-Fi driver initialization failed")?;
    let service = ConnectionService::new(
        config.service.clone(),
        link.clone(),
        Arc::new(LwipSocketTuning),
        Arc::new(TaskWatchdog),
    )
    .context("Invalid service configuration")?;
    let mut manager = LinkStateManager::new(station, service, link);
    manager
        .start(&credentials, &config.station.static_ip)
        .context("Wi-Fi station startup failed")?;

    info!("Echo port: {}", config.service.port);
    manager.run(events);

    error!("Link manager stopped");
    Ok(())
}

fn heartbeat(mut led: PinDriver<'static, Gpio17, Output>) {
    let watchdog = TaskWatchdog;
    watchdog.enter();
    loop {
        if let Err(e) = led.toggle() {
            warn!("Heartbeat LED toggle failed: {}", e);
        }
        watchdog.ping();
        std::thread::sleep(HEARTBEAT_PERIOD);
    }
}
