//! The index page: one roll-call vote, tallied by senate and by population.
//!
//! # Endpoints
//!
//! - `GET /` - Render the configured roll (`ROLL_ID`)

use axum::extract::State;
use axum::response::Html;
use tracing::instrument;

use crate::context::RequestScope;
use crate::error::AppResult;
use crate::state::AppState;
use crate::tally::VoteTally;

/// Fetch the configured vote, tally it and render `index.html`.
///
/// An unknown roll id is a not-found failure (404); an API or template
/// failure is unclassified (500) and shows up as a `PANIC:` line in the
/// request's log block.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, scope: RequestScope) -> AppResult<Html<String>> {
    let roll_id = &state.config.roll_id;
    let vote = state.sunlight.get_vote(roll_id).await?;
    let tally = VoteTally::from_vote(&vote);

    scope.logf(format_args!(
        "Rendering {roll_id}: {} voters, {} options",
        tally.senate_total,
        tally.options.len()
    ));
    if !tally.unknown_states.is_empty() {
        scope.logf(format_args!(
            "No census data for {}",
            tally.unknown_states.join(",")
        ));
    }

    let html = state.templates.render_index(&vote, &tally)?;
    Ok(Html(html))
}
