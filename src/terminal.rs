//! Console queries used to pick fancy vs dumb progress rendering.

#[cfg(unix)]
mod unix {
    pub fn is_smart() -> bool {
        unsafe {
            libc::isatty(/* stdout */ 1) == 1
        }
    }

    pub fn width() -> Option<usize> {
        unsafe {
            let mut winsize = std::mem::zeroed::<libc::winsize>();
            if libc::ioctl(1, libc::TIOCGWINSZ, &mut winsize) < 0 {
                return None;
            }
            // Too-narrow terminals report nonsense sizes; don't try to
            // render a bar into them.
            if winsize.ws_col < 10 {
                return None;
            }
            Some(winsize.ws_col as usize)
        }
    }
}

#[cfg(unix)]
pub use unix::*;

#[cfg(windows)]
mod windows {
    use windows_sys::Win32::System::Console::*;

    pub fn is_smart() -> bool {
        unsafe {
            let handle = GetStdHandle(STD_OUTPUT_HANDLE);
            let mut mode = 0;
            // GetConsoleMode fails when not attached to a console.
            let ok = GetConsoleMode(handle, &mut mode) != 0;
            if ok {
                // Enable VT processing so overprinting works; ignore errors.
                _ = SetConsoleMode(handle, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING);
            }
            ok
        }
    }

    pub fn width() -> Option<usize> {
        unsafe {
            let console = GetStdHandle(STD_OUTPUT_HANDLE);
            let mut csbi = std::mem::zeroed::<CONSOLE_SCREEN_BUFFER_INFO>();
            if GetConsoleScreenBufferInfo(console, &mut csbi) == 0 {
                return None;
            }
            if csbi.dwSize.X < 10 {
                return None;
            }
            Some(csbi.dwSize.X as usize)
        }
    }
}

#[cfg(windows)]
pub use windows::*;
