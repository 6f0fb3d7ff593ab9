//! # Data
//!
//! $$
//! \{(t, k, P_{t,k})\} \longrightarrow P \in \mathbb R^{T \times N} \longrightarrow R \in \mathbb R^{(T-1) \times N}
//! $$
//!
//! Market data ingestion, dense panels and time-series alignment.

pub mod align;
#[cfg(feature = "polars")]
pub mod frame;
pub mod ingest;
pub mod observation;
pub mod panel;

pub use align::align;
pub use align::AlignedData;
#[cfg(feature = "polars")]
pub use frame::observations_from_dataframe;
pub use ingest::load_observations;
pub use ingest::read_observations;
pub use observation::RawObservation;
pub use panel::Panel;
pub use panel::Series;
