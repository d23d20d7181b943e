pub mod aggregate_store;
pub mod reconcile;

pub use aggregate_store::AggregateStore;
pub use reconcile::{compute_aggregate, compute_counters, SnapshotProvider, SnapshotReconciler};
