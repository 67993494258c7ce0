mod cluster_actor;
mod cluster_builder;
mod cluster_error;
mod cluster_handle;
mod cluster_helpers;

pub use cluster_actor::*;
pub use cluster_builder::*;
pub use cluster_error::*;
pub use cluster_handle::*;
pub use cluster_helpers::*;
