//! Domain types for ForecastLab

pub mod frame;
pub mod matrix;
pub mod records;
pub mod series;
pub mod table;

pub use frame::{ColumnRole, Frame, FrameColumn};
pub use matrix::{FeatureMatrix, MatrixError};
pub use records::{BacktestRecord, ForecastRecord};
pub use series::{DailySeries, SeriesColumn, SeriesError};
pub use table::{
    parse_target_column, target_column, AlignedTable, FeatureTable, HorizonDataset, TableError,
    TrainableTable,
};

/// Name of the date column in every persisted table.
pub const DATE_COLUMN: &str = "date";
