pub mod battery_monitor;
pub mod reconciler;
pub mod station_picker;

pub use battery_monitor::BatteryMonitor;
pub use reconciler::Reconciler;
pub use station_picker::StationPicker;
