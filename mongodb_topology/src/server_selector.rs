/*!
Filters that narrow a list of candidate servers down to the ones an operation may use.

Selectors are pure: they never talk to servers, never add candidates, and an empty input
always yields an empty output. They compose through [`CompositeServerSelector`].
*/

mod composite_server_selector;
mod delegate_server_selector;
mod end_point_server_selector;
mod latency_limiting_server_selector;
mod random_server_selector;
mod read_preference_server_selector;
mod server_selector_error;
#[cfg(test)]
pub(crate) mod test_servers;
mod writable_server_selector;

use std::fmt::{Debug, Display};

use dyn_clone::DynClone;

pub use composite_server_selector::*;
pub use delegate_server_selector::*;
pub use end_point_server_selector::*;
pub use latency_limiting_server_selector::*;
pub use random_server_selector::*;
pub use read_preference_server_selector::*;
pub use server_selector_error::*;
pub use writable_server_selector::*;

use crate::{ClusterDescription, ServerDescription};

pub trait ServerSelector: DynClone + Debug + Display + Send + Sync {
    /// Returns the subset of `servers` this selector accepts, in their original order.
    fn select_servers(
        &self,
        cluster: &ClusterDescription,
        servers: &[ServerDescription],
    ) -> Result<Vec<ServerDescription>, ServerSelectorError>;
}

dyn_clone::clone_trait_object!(ServerSelector);

impl ServerSelector for Box<dyn ServerSelector> {
    fn select_servers(
        &self,
        cluster: &ClusterDescription,
        servers: &[ServerDescription],
    ) -> Result<Vec<ServerDescription>, ServerSelectorError> {
        (**self).select_servers(cluster, servers)
    }
}
