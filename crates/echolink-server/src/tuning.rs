//! Socket options the standard library does not expose.
//!
//! `std::net` binds with `SO_REUSEADDR` already set on Unix but gives no
//! control over the listen backlog or TCP keep-alive timing. The
//! [`SocketTuning`] seam lets each platform apply them natively:
//! - Linux/macOS: `libc` (`PosixSocketTuning`)
//! - ESP32: lwIP socket calls (in the `echolink-esp32` crate)

use std::io;
use std::net::{TcpListener, TcpStream};

use echolink_core::KeepaliveConfig;

pub trait SocketTuning: Send + Sync {
    /// Re-issue `listen` on a bound listener with the given backlog.
    fn set_backlog(&self, listener: &TcpListener, backlog: u32) -> io::Result<()>;

    /// Enable keep-alive probes on an accepted stream.
    fn apply_keepalive(&self, stream: &TcpStream, keepalive: &KeepaliveConfig) -> io::Result<()>;
}

/// Tuning through the host's BSD socket API.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixSocketTuning;

#[cfg(all(unix, not(target_os = "espidf")))]
mod posix {
    use super::*;
    use libc::{c_int, c_void, socklen_t};
    use std::os::fd::{AsRawFd, RawFd};

    fn clamp(value: u32) -> c_int {
        c_int::try_from(value).unwrap_or(c_int::MAX)
    }

    fn set_int_option(fd: RawFd, level: c_int, name: c_int, value: c_int) -> io::Result<()> {
        // SAFETY: `fd` is a live socket borrowed from std, and the option
        // value points at a properly sized c_int for the whole call.
        let rc = unsafe {
            libc::setsockopt(
                fd,
                level,
                name,
                &value as *const c_int as *const c_void,
                std::mem::size_of::<c_int>() as socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    impl SocketTuning for PosixSocketTuning {
        fn set_backlog(&self, listener: &TcpListener, backlog: u32) -> io::Result<()> {
            // SAFETY: the descriptor is owned by `listener` and outlives the call.
            let rc = unsafe { libc::listen(listener.as_raw_fd(), clamp(backlog)) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        fn apply_keepalive(
            &self,
            stream: &TcpStream,
            keepalive: &KeepaliveConfig,
        ) -> io::Result<()> {
            let fd = stream.as_raw_fd();
            set_int_option(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1)?;

            #[cfg(any(target_os = "linux", target_os = "android"))]
            set_int_option(
                fd,
                libc::IPPROTO_TCP,
                libc::TCP_KEEPIDLE,
                clamp(keepalive.idle_secs),
            )?;
            #[cfg(target_vendor = "apple")]
            set_int_option(
                fd,
                libc::IPPROTO_TCP,
                libc::TCP_KEEPALIVE,
                clamp(keepalive.idle_secs),
            )?;

            #[cfg(any(target_os = "linux", target_os = "android", target_vendor = "apple"))]
            {
                set_int_option(
                    fd,
                    libc::IPPROTO_TCP,
                    libc::TCP_KEEPINTVL,
                    clamp(keepalive.interval_secs),
                )?;
                set_int_option(
                    fd,
                    libc::IPPROTO_TCP,
                    libc::TCP_KEEPCNT,
                    clamp(keepalive.count),
                )?;
            }
            Ok(())
        }
    }
}

#[cfg(not(all(unix, not(target_os = "espidf"))))]
impl SocketTuning for PosixSocketTuning {
    fn set_backlog(&self, _listener: &TcpListener, backlog: u32) -> io::Result<()> {
        tracing::debug!(backlog, "Backlog tuning unsupported, keeping platform default");
        Ok(())
    }

    fn apply_keepalive(&self, _stream: &TcpStream, _keepalive: &KeepaliveConfig) -> io::Result<()> {
        tracing::debug!("Keep-alive tuning unsupported on this platform");
        Ok(())
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    fn get_int_option(stream: &TcpStream, level: libc::c_int, name: libc::c_int) -> libc::c_int {
        let mut value: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                stream.as_raw_fd(),
                level,
                name,
                &mut value as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        assert_eq!(rc, 0);
        value
    }

    #[test]
    fn test_keepalive_options_applied() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        PosixSocketTuning.set_backlog(&listener, 1).unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, _) = listener.accept().unwrap();

        let keepalive = KeepaliveConfig {
            idle_secs: 7,
            interval_secs: 3,
            count: 4,
        };
        PosixSocketTuning.apply_keepalive(&accepted, &keepalive).unwrap();

        assert_eq!(get_int_option(&accepted, libc::SOL_SOCKET, libc::SO_KEEPALIVE), 1);
        assert_eq!(get_int_option(&accepted, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE), 7);
        assert_eq!(get_int_option(&accepted, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL), 3);
        assert_eq!(get_int_option(&accepted, libc::IPPROTO_TCP, libc::TCP_KEEPCNT), 4);
        drop(client);
    }
}
