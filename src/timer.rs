/// Periodic timer boundary used to drive channel rotation.
use crate::radio::RadioError;

/// Work run on every timer expiry. Runs on the timer service's context,
/// concurrently with control calls, so it only gets `&self`.
pub trait TimerCallback: Sync {
    fn on_timer(&self);
}

/// Platform timer service. Dropping a handle destroys its timer.
pub trait TimerService {
    type Handle;

    /// Create a stopped auto-reloading timer.
    fn create_periodic(
        &mut self,
        period_ms: u32,
        callback: &'static dyn TimerCallback,
    ) -> Result<Self::Handle, RadioError>;

    fn start(&mut self, handle: &mut Self::Handle) -> Result<(), RadioError>;

    fn stop(&mut self, handle: &mut Self::Handle) -> Result<(), RadioError>;
}
