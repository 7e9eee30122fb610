//! Live overlay: stat selection rules and the educational ticker

mod engine;
mod ticker;

pub use engine::{
    abbreviate_stat, local_date_of, local_day_bounds, resolve_zone, DashboardEngine, StatEntry,
    StatSelection, StatValue, TimePeriod,
};
pub use ticker::{TickerEngine, TickerFacts};
