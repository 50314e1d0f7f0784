//! Load priority, shared by the cache's eviction score and the async
//! load queue's scheduling order.

/// Relative importance of a load, from opportunistic preloads up to
/// caller-blocking requests.
///
/// Declared low-to-high so the derived [`Ord`] sorts a [`std::collections::BinaryHeap`]
/// of requests with the most urgent on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl LoadPriority {
    /// The number of one-hour units this priority boosts a cache
    /// entry's effective recency by (see [`crate::cache::Cache`]).
    pub fn boost_units(self) -> i64 {
        match self {
            LoadPriority::Low => 0,
            LoadPriority::Normal => 1,
            LoadPriority::High => 2,
            LoadPriority::Critical => 3,
        }
    }
}

impl Default for LoadPriority {
    fn default() -> Self {
        LoadPriority::Normal
    }
}
