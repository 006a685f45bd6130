//! Data preprocessing applied inside model pipelines

mod scaler;

pub use scaler::StandardScaler;
