mod error;
pub use error::*;

mod session;
pub use session::*;

mod api;
pub use api::*;

mod endpoint;
pub use endpoint::*;

mod worker;
pub use worker::*;

mod task;
pub use task::*;

mod metrics;
pub use metrics::*;

mod billing;
pub use billing::*;

mod spec;
pub use spec::*;

mod cluster;
pub use cluster::*;

mod credential;
pub use credential::*;

/// Deserializes `null` as the default value of `T`.
///
/// Use together with `#[serde(default)]` so that both missing and `null` fields
/// end up as the default.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
