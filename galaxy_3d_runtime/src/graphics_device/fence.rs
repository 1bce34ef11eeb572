/// DeviceFence trait - GPU timeline counter

use std::time::Duration;
use crate::error::Result;

/// GPU-side monotonic counter
///
/// Values are signaled on a queue through `GraphicsDevice::signal` and become
/// "completed" once the GPU has executed everything submitted before the signal.
/// Backed by a timeline semaphore in Vulkan.
pub trait DeviceFence: Send + Sync {
    /// Highest value the GPU has completed
    fn completed_value(&self) -> Result<u64>;

    /// Block until the completed value reaches `value`
    ///
    /// Returns `Ok(false)` when `timeout` elapsed first.
    fn wait(&self, value: u64, timeout: Duration) -> Result<bool>;
}
