//! External data collaborators: unit records and the log-server mapping.

pub mod mapping;
pub mod units;

pub use mapping::{LogServer, fetch_log_servers};
pub use units::{
    HttpUnitSource, JsonFileSource, StatusFilter, UnitFilter, UnitSource,
    apply_profile_exclusions, source_for,
};
