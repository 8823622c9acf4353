//! Display presenter: renders detection and lock state on the character LCD.
//!
//! Layout (16x2):
//! ```text
//! Status: Detected
//! Door:   Locked
//! ```
//! Only values that changed since the last successful render are rewritten.
//! The panel is initialized on the first render and again after any display
//! error, so a panel that missed power-on comes up once it answers.

use embassy_time::Ticker;

use crate::bus::BusArbiter;
use crate::config::{
    DISPLAY_LOCK_ROW, DISPLAY_PERIOD, DISPLAY_PRESENCE_ROW, DISPLAY_VALUE_COL, DISPLAY_VALUE_WIDTH,
};
use crate::drivers::CharacterDisplay;
use crate::shared::{SharedState, Snapshot};
use crate::Error;

const PRESENCE_LABEL: &str = "Status:";
const LOCK_LABEL: &str = "Door:";

/// What is believed to be on the glass right now.
#[derive(Debug, Default)]
struct Shown {
    labels: bool,
    presence: Option<&'static str>,
    lock: Option<&'static str>,
    backlight: Option<bool>,
}

#[derive(Debug, Default)]
pub struct Presenter {
    shown: Shown,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the display in line with `snapshot`. Returns the number of value
    /// lines rewritten.
    ///
    /// On a display error the cache is dropped, so the next render
    /// re-initializes the panel and redraws everything.
    pub fn render<D: CharacterDisplay>(
        &mut self,
        display: &mut D,
        snapshot: Snapshot,
    ) -> Result<usize, Error> {
        let result = self.render_changes(display, snapshot);
        if result.is_err() {
            self.shown = Shown::default();
        }
        result
    }

    fn render_changes<D: CharacterDisplay>(
        &mut self,
        display: &mut D,
        snapshot: Snapshot,
    ) -> Result<usize, Error> {
        if !self.shown.labels {
            display.init()?;
            display.write(DISPLAY_PRESENCE_ROW, 0, PRESENCE_LABEL)?;
            display.write(DISPLAY_LOCK_ROW, 0, LOCK_LABEL)?;
            self.shown.labels = true;
        }

        let mut written = 0;
        let presence = snapshot.detection.label();
        if self.shown.presence != Some(presence) {
            write_value(display, DISPLAY_PRESENCE_ROW, presence)?;
            self.shown.presence = Some(presence);
            written += 1;
        }

        let lock = snapshot.lock.label();
        if self.shown.lock != Some(lock) {
            write_value(display, DISPLAY_LOCK_ROW, lock)?;
            self.shown.lock = Some(lock);
            written += 1;
        }

        let backlight = snapshot.backlight.is_on();
        if self.shown.backlight != Some(backlight) {
            display.backlight(backlight)?;
            self.shown.backlight = Some(backlight);
        }

        Ok(written)
    }

    /// Render every [`DISPLAY_PERIOD`]. A cycle whose bus acquisition times
    /// out is skipped.
    pub async fn run<D: CharacterDisplay>(mut self, shared: &SharedState, bus: &BusArbiter<D>) -> ! {
        log::info!("display: started, period={}ms", DISPLAY_PERIOD.as_millis());
        let mut ticker = Ticker::every(DISPLAY_PERIOD);

        loop {
            match bus.acquire().await {
                Ok(mut display) => {
                    if let Err(e) = self.render(&mut *display, shared.snapshot()) {
                        log::warn!("display: render failed: {}", e);
                    }
                }
                Err(_) => log::warn!("display: bus timeout, skipping cycle"),
            }
            ticker.next().await;
        }
    }
}

fn write_value<D: CharacterDisplay>(display: &mut D, row: u8, text: &str) -> Result<(), Error> {
    display.clear_region(row, DISPLAY_VALUE_COL, DISPLAY_VALUE_WIDTH)?;
    display.write(row, DISPLAY_VALUE_COL, text)
}
