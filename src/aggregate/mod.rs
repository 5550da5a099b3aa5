//! Hourly aggregation and ranking
//!
//! Workers drain their [`HourLightMatrix`](crate::traffic::HourLightMatrix)
//! through [`send_partials`]; the coordinator pulls one vector per worker per
//! hour with [`merge_hour`] and ranks the lights into an [`HourReport`].
//!
//! # Example
//!
//! ```
//! use trafficpulse::aggregate::HourReport;
//!
//! let report = HourReport::from_totals(6, &[15, 20, 15]);
//! let order: Vec<usize> = report.entries.iter().map(|e| e.light_id).collect();
//! assert_eq!(order, vec![1, 0, 2]);
//! ```

pub mod merge;
pub mod partial;

use serde::{Deserialize, Serialize};

pub use merge::merge_hour;
pub use partial::send_partials;

/// Cars through one light during one hour, summed over all workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightTotal {
    pub light_id: usize,
    pub total: u64,
}

/// Lights of one hour, busiest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourReport {
    pub hour: usize,
    /// One entry per light, descending by total, ties by ascending light id
    pub entries: Vec<LightTotal>,
}

impl HourReport {
    /// Rank per-light totals (indexed by light id)
    pub fn from_totals(hour: usize, totals: &[u64]) -> Self {
        Self {
            hour,
            entries: rank_lights(totals),
        }
    }

    /// The `n` busiest lights (all of them if fewer)
    pub fn top(&self, n: usize) -> &[LightTotal] {
        &self.entries[..n.min(self.entries.len())]
    }
}

/// Order lights by descending total
///
/// `sort_by` is stable, so equal totals keep ascending light-id order.
pub fn rank_lights(totals: &[u64]) -> Vec<LightTotal> {
    let mut ranked: Vec<LightTotal> = totals
        .iter()
        .enumerate()
        .map(|(light_id, &total)| LightTotal { light_id, total })
        .collect();

    ranked.sort_by(|a, b| b.total.cmp(&a.total));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_descending() {
        let ranked = rank_lights(&[5, 40, 12, 33]);
        let ids: Vec<usize> = ranked.iter().map(|l| l.light_id).collect();
        assert_eq!(ids, vec![1, 3, 2, 0]);
        assert_eq!(ranked[0], LightTotal { light_id: 1, total: 40 });
    }

    #[test]
    fn test_ties_keep_light_order() {
        let ranked = rank_lights(&[7, 9, 7, 9, 7]);
        let ids: Vec<usize> = ranked.iter().map(|l| l.light_id).collect();
        assert_eq!(ids, vec![1, 3, 0, 2, 4]);

        let all_zero = rank_lights(&[0, 0, 0]);
        let ids: Vec<usize> = all_zero.iter().map(|l| l.light_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_top_truncates() {
        let report = HourReport::from_totals(9, &[1, 2, 3, 4, 5]);
        assert_eq!(report.top(3).len(), 3);
        assert_eq!(report.top(3)[0].light_id, 4);
        assert_eq!(report.top(10).len(), 5);
        assert!(report.top(0).is_empty());
    }
}
