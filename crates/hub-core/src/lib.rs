//! Core types for the automation hub
//!
//! This crate provides the fundamental types shared by every other hub
//! crate: [`DeviceId`], [`DeviceState`], [`Device`], the concurrent
//! [`DeviceList`] and the human readable [`HumanDuration`].

mod device;
mod device_id;
mod duration;
mod state;

pub use device::{Device, DeviceList};
pub use device_id::{DeviceId, DeviceIdError};
pub use duration::{DurationError, HumanDuration};
pub use state::DeviceState;

/// Build a [`DeviceState`] from `key => value` pairs
///
/// ```
/// use hub_core::device_state;
///
/// let state = device_state! { "on" => true, "brightness" => 40 };
/// assert_eq!(state.bool("on"), Some(true));
/// ```
#[macro_export]
macro_rules! device_state {
    () => { $crate::DeviceState::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut state = $crate::DeviceState::new();
        $( state.insert($key, $value); )+
        state
    }};
}
