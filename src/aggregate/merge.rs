//! Coordinator-side collective merger

use super::HourReport;
use crate::config::TrafficConfig;
use crate::distributed::transport::PartialReceiver;
use crate::error::PipelineError;
use tracing::debug;

/// Merge one hour from every worker and rank the lights
///
/// Receives from ranks `1..world_size` in that order; rank 0 coordinates and
/// holds no shard. Blocks on each (hour, rank) until its partial arrives.
pub async fn merge_hour<R: PartialReceiver>(
    hour: usize,
    world_size: usize,
    receiver: &mut R,
    traffic: &TrafficConfig,
) -> Result<HourReport, PipelineError> {
    let mut totals = vec![0u64; traffic.num_lights];

    for rank in 1..world_size {
        let partial = receiver.recv_partial(hour, rank).await?;

        if partial.len() != totals.len() {
            return Err(PipelineError::communication(
                rank,
                format!(
                    "hour {} carries {} lights, expected {}",
                    hour,
                    partial.len(),
                    totals.len()
                ),
            ));
        }

        debug!(hour, rank, totals = ?partial, "received partial");

        for (light_id, (total, cars)) in totals.iter_mut().zip(&partial).enumerate() {
            *total = total.checked_add(*cars).ok_or_else(|| {
                PipelineError::communication(
                    rank,
                    format!("hour {} light {} total overflows", hour, light_id),
                )
            })?;
        }
    }

    Ok(HourReport::from_totals(hour, &totals))
}
