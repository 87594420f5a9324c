// SPDX-License-Identifier: MIT
//
// TtyBackend: the real terminal behind `Backend`.
//
// Safety: termios (tcgetattr, tcsetattr), ioctl (TIOCGWINSZ), isatty,
// sigaction and the raw fd write in the panic hook are POSIX interfaces with
// no safe wrapper in std. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// Raw mode is entered via termios on stdin. Resize notifications come from a
// SIGWINCH handler that only flips an atomic flag; `take_resize` consumes it.
//
// A panic while in raw mode would leave the user's shell unusable, so the
// first `enable_raw_mode` installs a panic hook that writes a pre-built
// restore sequence straight to fd 1 (bypassing the stdout lock, which the
// panicking thread may hold) and restores termios from a global backup
// before the original hook prints the message.

use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::terminal::{Backend, Size};

// ─── Queries ────────────────────────────────────────────────────────────────

/// Current size of the terminal on stdout via `ioctl(TIOCGWINSZ)`.
#[must_use]
pub fn query_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };
    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size::new(ws.ws_col, ws.ws_row))
    } else {
        None
    }
}

/// Whether stdin is a terminal.
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

// ─── SIGWINCH ───────────────────────────────────────────────────────────────

static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);
static SIGWINCH_INSTALLED: Once = Once::new();

fn install_sigwinch_handler() {
    SIGWINCH_INSTALLED.call_once(|| unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    });
}

extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
}

// ─── Panic-Safe Restore ─────────────────────────────────────────────────────

static TERMIOS_BACKUP: Mutex<Option<libc::termios>> = parking_lot::const_mutex(None);

/// Everything `Terminal::enter` may have switched on, switched off.
///
/// Alternate screen exit is last so the shell reappears without artifacts.
#[rustfmt::skip]
pub(crate) const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?2026l\
    \x1b]8;;\x1b\\\
    \x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l\
    \x1b[<u\
    \x1b[?2004l\
    \x1b[?1004l\
    \x1b[0m\
    \x1b[0 q\
    \x1b[?25h\
    \x1b[?1049l";

static PANIC_HOOK_INSTALLED: Once = Once::new();

fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            unsafe {
                let _ = libc::write(
                    libc::STDOUT_FILENO,
                    EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
                    EMERGENCY_RESTORE.len(),
                );
            }
            // try_lock: the panicking thread may be the one holding it.
            if let Some(guard) = TERMIOS_BACKUP.try_lock() {
                if let Some(ref original) = *guard {
                    unsafe {
                        let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
                    }
                }
            }
            original(info);
        }));
    });
}

// ─── TtyBackend ─────────────────────────────────────────────────────────────

/// `Backend` over the process's controlling terminal.
///
/// When stdin is not a TTY (pipes, CI) raw mode is a no-op and the size
/// falls back to 80×24.
pub struct TtyBackend {
    original: Mutex<Option<libc::termios>>,
}

impl TtyBackend {
    #[must_use]
    pub fn new() -> Self {
        install_sigwinch_handler();
        Self {
            original: Mutex::new(None),
        }
    }
}

impl Default for TtyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for TtyBackend {
    fn enable_raw_mode(&self) -> io::Result<()> {
        if !is_tty() {
            return Ok(());
        }
        let mut original = self.original.lock();
        if original.is_some() {
            return Ok(());
        }
        install_panic_hook();

        let fd = io::stdin().as_raw_fd();
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            let saved = termios;

            // cfmakeraw equivalent.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &=
                !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            *original = Some(saved);
            *TERMIOS_BACKUP.lock() = Some(saved);
        }
        Ok(())
    }

    fn disable_raw_mode(&self) -> io::Result<()> {
        let mut original = self.original.lock();
        if let Some(ref saved) = *original {
            let fd = io::stdin().as_raw_fd();
            unsafe {
                if libc::tcsetattr(fd, libc::TCSAFLUSH, saved) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }
            *TERMIOS_BACKUP.lock() = None;
            *original = None;
        }
        Ok(())
    }

    fn size(&self) -> io::Result<Size> {
        Ok(query_size().unwrap_or(Size::new(80, 24)))
    }

    fn take_resize(&self) -> bool {
        SIGWINCH_RECEIVED.swap(false, Ordering::Relaxed)
    }
}

impl Drop for TtyBackend {
    fn drop(&mut self) {
        let _ = self.disable_raw_mode();
    }
}
