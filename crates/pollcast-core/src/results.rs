use crate::error::CoreError;
use pollcast_db::DbPool;
use pollcast_models::poll::{PollResponse, PollResults};

/// Per-option counts; a response adds at most one to each option it names.
pub fn tally(option_count: usize, responses: &[PollResponse]) -> Vec<u64> {
    let mut counts = vec![0u64; option_count];
    let mut seen = Vec::new();
    for response in responses {
        seen.clear();
        for &index in &response.option_indices {
            let Ok(slot) = usize::try_from(index) else {
                continue;
            };
            if slot < option_count && !seen.contains(&slot) {
                seen.push(slot);
                counts[slot] += 1;
            }
        }
    }
    counts
}

pub async fn aggregate(pool: &DbPool, logical_poll_id: &str) -> Result<PollResults, CoreError> {
    let poll = crate::polls::require_poll(pool, logical_poll_id).await?;
    let responses: Vec<PollResponse> =
        pollcast_db::poll_responses::get_poll_responses(pool, logical_poll_id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
    let option_counts = tally(poll.options.len(), &responses);
    Ok(PollResults {
        total_responses: responses.len() as u64,
        option_counts,
        responses,
        poll,
    })
}
