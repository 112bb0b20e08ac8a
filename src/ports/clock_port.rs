//! Time port: lets the trading loop and retry backoff wait without blocking tests.

use std::time::Duration;

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}
