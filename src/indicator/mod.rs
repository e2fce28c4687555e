//! Status indicator collaborator
//!
//! Fire-and-forget colour output on an addressable LED. Nothing in the
//! core reads back what the indicator shows.

use std::sync::Mutex;

use tracing::debug;

/// An RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// Colours shown for each state of the device
pub mod colors {
    use super::Rgb;

    pub const WAITING: Rgb = Rgb::new(0, 0, 32);
    pub const CONNECTED: Rgb = Rgb::new(0, 32, 32);
    pub const STREAMING: Rgb = Rgb::new(0, 64, 0);
    pub const FAULT: Rgb = Rgb::new(64, 0, 0);
}

/// Index of the single status pixel
pub const STATUS_PIXEL: u32 = 0;

/// Addressable LED output
pub trait StatusIndicator: Send + Sync {
    fn set_color(&self, index: u32, red: u8, green: u8, blue: u8);

    fn off(&self);

    fn show(&self, color: Rgb) {
        self.set_color(STATUS_PIXEL, color.red, color.green, color.blue);
    }
}

/// Indicator that reports colour changes through tracing
#[derive(Debug, Default)]
pub struct TracingIndicator {
    current: Mutex<Option<(u32, Rgb)>>,
}

impl TracingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, next: Option<(u32, Rgb)>) {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *current != next {
            match next {
                Some((index, c)) => {
                    debug!(index, red = c.red, green = c.green, blue = c.blue, "led set")
                }
                None => debug!("led off"),
            }
            *current = next;
        }
    }
}

impl StatusIndicator for TracingIndicator {
    fn set_color(&self, index: u32, red: u8, green: u8, blue: u8) {
        self.update(Some((index, Rgb::new(red, green, blue))));
    }

    fn off(&self) {
        self.update(None);
    }
}
