/// Fence - monotonic GPU/CPU synchronization counter
///
/// Wraps a `DeviceFence` bound to one queue. `signal` enqueues the next value
/// on the queue, `wait` blocks the CPU until the GPU reached the last signaled
/// value. The counter never decreases.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::graphics_device::{DeviceFence, GraphicsDevice, QueueKind};
use crate::engine_error;

/// Default bound on a CPU wait before the GPU is considered hung
pub const DEFAULT_FENCE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Fence {
    name: String,
    queue: QueueKind,
    fence: Arc<dyn DeviceFence>,
    value: u64,
    timeout: Duration,
}

impl Fence {
    /// Create a fence at value 0 on `queue`
    pub fn new(
        device: &mut dyn GraphicsDevice,
        name: &str,
        queue: QueueKind,
        timeout: Duration,
    ) -> Result<Self> {
        let fence = device.create_fence(0)?;
        Ok(Self {
            name: name.to_string(),
            queue,
            fence,
            value: 0,
            timeout,
        })
    }

    /// Enqueue a GPU signal of the next value and return it
    ///
    /// The counter only advances if the device accepted the signal.
    pub fn signal(&mut self, device: &mut dyn GraphicsDevice) -> Result<u64> {
        let next = self.value + 1;
        device.signal(self.queue, self.fence.as_ref(), next)?;
        self.value = next;
        Ok(next)
    }

    /// Block until the last signaled value is completed
    pub fn wait(&self) -> Result<()> {
        self.wait_for(self.value)
    }

    /// Block until `value` is completed
    ///
    /// Returns immediately if it already is. A timeout is reported as
    /// `Error::DeviceHang`.
    pub fn wait_for(&self, value: u64) -> Result<()> {
        if value == 0 || self.fence.completed_value()? >= value {
            return Ok(());
        }

        if self.fence.wait(value, self.timeout)? {
            return Ok(());
        }

        let timeout_ms = self.timeout.as_millis() as u64;
        engine_error!(
            "galaxy3d::Fence",
            "Fence '{}' did not reach {} within {} ms",
            self.name, value, timeout_ms
        );
        Err(Error::DeviceHang {
            fence: self.name.clone(),
            value,
            timeout_ms,
        })
    }

    /// Last signaled value
    pub fn current_value(&self) -> u64 {
        self.value
    }

    /// Last value the GPU completed
    pub fn completed_value(&self) -> Result<u64> {
        self.fence.completed_value()
    }

    /// Whether everything signaled so far is completed
    pub fn is_idle(&self) -> Result<bool> {
        Ok(self.completed_value()? >= self.value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
#[path = "fence_tests.rs"]
mod tests;
