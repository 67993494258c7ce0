mod round_trip_time;
mod server_monitor_actor;
mod server_monitor_handle;
mod server_monitor_helpers;

pub use round_trip_time::*;
pub use server_monitor_actor::*;
pub use server_monitor_handle::*;
pub use server_monitor_helpers::*;
