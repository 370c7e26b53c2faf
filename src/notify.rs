//! Operator feedback hooks.
//!
//! The router drives a buzzer, status LEDs and an inventory mode switch
//! through this seam. Firmware targets implement it against real GPIO;
//! host builds and tests use [`NullNotifier`].

/// Receives tag-read and mode-change events from the router.
pub trait Notifier: Send + Sync {
    /// Short beep on a newly accepted tag.
    fn beep(&self) {}

    /// Flash the activity LED on a tag read.
    fn tag_read(&self) {}

    /// Inventory mode entered or left.
    fn inventory_active(&self, _active: bool) {}
}

/// Notifier that discards every event.
pub struct NullNotifier;

impl Notifier for NullNotifier {}
