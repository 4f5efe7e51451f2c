//! Build script for the echolink ESP32 firmware.
//!
//! Exports the ESP-IDF environment so esp-idf-svc can locate the toolchain.

fn main() {
    embuild::espidf::sysenv::output();
}
