//! # echolink-server
//!
//! Link-gated, single-client TCP echo service.
//!
//! Built on blocking-free `std::net` sockets and one worker thread, so the
//! same code runs on Linux and on ESP32 (esp-idf std).

pub mod service;
pub mod stats;
pub mod tuning;

pub use echolink_core::{LinkState, LinkStateCell, ServiceConfig};
pub use service::{ConnectionService, ServiceError};
pub use stats::{ServiceStats, StatsSnapshot};
pub use tuning::{PosixSocketTuning, SocketTuning};
