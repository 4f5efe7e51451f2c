//! Task watchdog liveness.
//!
//! Each thread that calls [`Liveness::enter`] is subscribed to the ESP-IDF
//! task watchdog and must call [`Liveness::ping`] within the configured
//! timeout (`CONFIG_ESP_TASK_WDT_TIMEOUT_S`) until it calls
//! [`Liveness::leave`].

use echolink_core::Liveness;
use esp_idf_svc::sys::{esp_task_wdt_add, esp_task_wdt_delete, esp_task_wdt_reset, ESP_OK};
use log::warn;

#[derive(Debug, Default, Clone, Copy)]
pub struct TaskWatchdog;

impl Liveness for TaskWatchdog {
    fn enter(&self) {
        // SAFETY: a null handle subscribes the calling FreeRTOS task.
        let rc = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
        if rc != ESP_OK {
            warn!("Failed to subscribe task to watchdog: error {}", rc);
        }
    }

    fn ping(&self) {
        // SAFETY: plain FFI call; returns an error for unsubscribed tasks,
        // which is harmless.
        unsafe {
            esp_task_wdt_reset();
        }
    }

    fn leave(&self) {
        // SAFETY: a null handle unsubscribes the calling FreeRTOS task.
        let rc = unsafe { esp_task_wdt_delete(core::ptr::null_mut()) };
        if rc != ESP_OK {
            warn!("Failed to unsubscribe task from watchdog: error {}", rc);
        }
    }
}
