//! lwIP socket tuning.
//!
//! `std::net` sockets on ESP-IDF are lwIP descriptors, so options are set
//! through the lwIP entry points.

use std::io;
use std::net::{TcpListener, TcpStream};
use std::os::fd::AsRawFd;

use echolink_core::KeepaliveConfig;
use echolink_server::SocketTuning;
use esp_idf_svc::sys::{
    lwip_listen, lwip_setsockopt, socklen_t, IPPROTO_TCP, SOL_SOCKET, SO_KEEPALIVE, TCP_KEEPCNT,
    TCP_KEEPIDLE, TCP_KEEPINTVL,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct LwipSocketTuning;

fn clamp(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn set_int_option(fd: i32, level: u32, name: u32, value: i32) -> io::Result<()> {
    // SAFETY: `fd` is a live lwIP socket and `value` outlives the call.
    let rc = unsafe {
        lwip_setsockopt(
            fd,
            level as i32,
            name as i32,
            &value as *const i32 as *const core::ffi::c_void,
            core::mem::size_of::<i32>() as socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl SocketTuning for LwipSocketTuning {
    fn set_backlog(&self, listener: &TcpListener, backlog: u32) -> io::Result<()> {
        // SAFETY: the descriptor is owned by `listener` for the whole call.
        let rc = unsafe { lwip_listen(listener.as_raw_fd(), clamp(backlog)) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn apply_keepalive(&self, stream: &TcpStream, keepalive: &KeepaliveConfig) -> io::Result<()> {
        let fd = stream.as_raw_fd();
        set_int_option(fd, SOL_SOCKET, SO_KEEPALIVE, 1)?;
        set_int_option(fd, IPPROTO_TCP, TCP_KEEPIDLE, clamp(keepalive.idle_secs))?;
        set_int_option(fd, IPPROTO_TCP, TCP_KEEPINTVL, clamp(keepalive.interval_secs))?;
        set_int_option(fd, IPPROTO_TCP, TCP_KEEPCNT, clamp(keepalive.count))?;
        Ok(())
    }
}
