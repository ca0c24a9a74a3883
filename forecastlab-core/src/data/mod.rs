//! Data layer: source specs, CSV loading, calendar alignment, EIA and AGSI
//! fetches, AIS event aggregation.

pub mod agsi;
pub mod ais;
pub mod align;
pub mod eia;
pub mod loader;
pub mod source;

pub use agsi::{AgsiClient, AgsiQuery};
pub use ais::{aggregate_ais, AisOptions};
pub use align::{align, span_days, AlignError};
pub use eia::{EiaClient, EiaQuery};
pub use loader::{
    load_anchor, load_source, load_sources, read_series_csv, read_trainable_csv,
    write_series_csv, write_trainable_csv, LoadedSources,
};
pub use source::{AnchorSpec, DataError, SourceKind, SourceSpec};
