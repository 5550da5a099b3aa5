//! Worker-side partial aggregator

use crate::distributed::transport::PartialSender;
use crate::error::PipelineError;
use crate::traffic::HourLightMatrix;
use tracing::debug;

/// Send every hour of `matrix` to the coordinator, hour 0 first
///
/// Consumes the matrix: once drained it is never reused. Each send returns
/// only after the coordinator accepted it; the first failure aborts.
pub async fn send_partials<S: PartialSender>(
    matrix: HourLightMatrix,
    sender: &mut S,
) -> Result<usize, PipelineError> {
    let mut sent = 0;

    for (hour, row) in matrix.rows() {
        debug!(hour, totals = ?row, "sending partial");
        sender.send_partial(hour, row).await?;
        sent += 1;
    }

    Ok(sent)
}
