//! Windowing and aggregation (spec §4.4).

mod aggregate;
mod aggregator;
mod group_by;
mod trigger;
mod window;
mod window_aggregate;

pub use aggregate::{
    Aggregate, Avg, Count, DCount, GlobalMax, GlobalMin, LRecent, MRecent, Max, Median, Min,
    SumF64, SumI64,
};
pub use aggregator::{Aggregator1, Aggregator2, Aggregator3, Aggregator4};
pub use group_by::GroupBy;
pub use trigger::{Trigger, TriggerPolicy};
pub use window::{SlidingWindow, TumblingWindow, WindowKind, WindowManager, WindowOutcome};
pub use window_aggregate::WindowAggregate;
