use std::borrow::Cow;
use std::time::{Duration, Instant};

/// Logs how long it lived, either on `end()` or on drop.
#[derive(Debug)]
pub struct Timer
{
    has_terminated: bool,
    name:           Cow<'static, str>,
    start_time:     Instant
}

impl Drop for Timer
{
    fn drop(&mut self)
    {
        if !self.has_terminated
        {
            self.print_termination_message();
        }
    }
}

impl Timer
{
    pub fn new(name: impl Into<Cow<'static, str>>) -> Timer
    {
        Timer {
            has_terminated: false,
            name:           name.into(),
            start_time:     Instant::now()
        }
    }

    pub fn elapsed(&self) -> Duration
    {
        self.start_time.elapsed()
    }

    pub fn end(mut self) -> Duration
    {
        self.has_terminated = true;

        self.print_termination_message();

        self.elapsed()
    }

    fn print_termination_message(&self)
    {
        log::debug!(
            "Timer {} completed in {:.3}ms",
            self.name,
            self.elapsed().as_secs_f64() * 1000.0
        );
    }
}
