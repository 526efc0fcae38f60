//! Asynchronous timer abstraction providing the delays required by the
//! reset settle time and mailbox polling.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait ChipTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms(&mut self, millis: u32) -> impl core::future::Future<Output = ()>;
}

/// [`ChipTimer`] backed by `embassy-time`, for targets running an Embassy
/// time driver.
#[cfg(feature = "embassy-time")]
pub struct EmbassyTimer;

#[cfg(feature = "embassy-time")]
impl ChipTimer for EmbassyTimer {
    async fn delay_ms(&mut self, millis: u32) {
        embassy_time::Timer::after(embassy_time::Duration::from_millis(millis as u64)).await;
    }
}
