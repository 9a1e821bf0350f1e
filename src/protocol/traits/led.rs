//! Feedback LED abstraction. A plain GPIO write on real hardware.

/// Contract to drive the operator feedback LED.
pub trait Led {
    /// Set the LED state.
    fn set(&mut self, on: bool);
}
