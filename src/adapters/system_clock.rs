//! Wall-clock sleeper.

use std::time::Duration;

use crate::ports::clock_port::Sleeper;

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
