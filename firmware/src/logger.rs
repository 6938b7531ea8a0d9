use core::cell::RefCell;
use core::fmt::Write;

use arrayvec::ArrayString;
use cortex_m::interrupt::Mutex;
use log::*;

pub const LINE_CAPACITY: usize = 256;

/// Formats `log` records into a line buffer and hands each line to defmt
pub struct Logger {
    pub line: Mutex<RefCell<ArrayString<LINE_CAPACITY>>>,
}

impl log::Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        cortex_m::interrupt::free(|cs| {
            let mut line = self.line.borrow(cs).borrow_mut();
            line.clear();

            // a piece that does not fit is dropped along with the rest of the line
            write!(
                &mut *line,
                "{} {}",
                record
                    .target()
                    .split("::")
                    .last()
                    .unwrap_or_else(|| record.target()),
                record.args()
            )
            .ok();

            let text = line.as_str();
            match record.level() {
                Level::Error => defmt::error!("{=str}", text),
                Level::Warn => defmt::warn!("{=str}", text),
                Level::Info => defmt::info!("{=str}", text),
                Level::Debug => defmt::debug!("{=str}", text),
                Level::Trace => defmt::trace!("{=str}", text),
            }
        });
    }

    fn flush(&self) {}
}
