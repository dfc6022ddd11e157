//! Log capture for unit tests
//!
//! Records are kept per thread, so tests running in parallel only ever see
//! what they logged themselves. `#[tokio::test]` runs on a current-thread
//! runtime, which keeps spawned tasks on the test thread too.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;
use std::sync::Once;

struct ThreadCapture;

static LOGGER: ThreadCapture = ThreadCapture;
static INIT: Once = Once::new();

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

impl Log for ThreadCapture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
    }

    fn flush(&self) {}
}

/// Installs the capturing logger and forgets what this thread logged so far.
pub fn capture() {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    RECORDS.with(|records| records.borrow_mut().clear());
}

/// Number of records at `level` whose message contains `needle`
pub fn count(level: Level, needle: &str) -> usize {
    RECORDS.with(|records| {
        records
            .borrow()
            .iter()
            .filter(|(l, message)| *l == level && message.contains(needle))
            .count()
    })
}

/// Number of records at `level`, whatever the message
pub fn count_level(level: Level) -> usize {
    RECORDS.with(|records| records.borrow().iter().filter(|(l, _)| *l == level).count())
}
