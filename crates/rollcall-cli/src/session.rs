//! The attendance session loop: capture → detect/identify → decide →
//! (optional) persist. Single-threaded and synchronous; the session ends
//! when the frame source is exhausted.

use anyhow::Result;
use rollcall_core::{Clock, Decision, DecisionEngine, FrameSource, RecognitionAdapter, UserId};
use rollcall_store::Database;

#[derive(Debug, Default)]
pub struct SessionSummary {
    pub frames: usize,
    /// Users marked for the first time today during this session.
    pub marked: Vec<UserId>,
    pub unknown_sightings: usize,
}

pub fn run_session<S, A, C>(
    source: &mut S,
    adapter: &mut A,
    engine: &mut DecisionEngine<C>,
    db: &mut Database,
) -> Result<SessionSummary>
where
    S: FrameSource,
    A: RecognitionAdapter,
    C: Clock,
{
    let mut summary = SessionSummary::default();

    while let Some(frame) = source.next_frame()? {
        summary.frames += 1;
        for observation in adapter.detect_and_identify(&frame)? {
            match engine.evaluate(&observation, db)? {
                Decision::Unknown => {
                    summary.unknown_sightings += 1;
                    tracing::debug!(
                        confidence = observation.confidence,
                        "unrecognized face"
                    );
                }
                Decision::MarkedNow(user_id) => {
                    let name = db
                        .user_by_id(user_id)?
                        .map(|u| u.name)
                        .unwrap_or_else(|| format!("user {user_id}"));
                    tracing::info!(user_id, %name, "attendance marked");
                    summary.marked.push(user_id);
                }
                Decision::AlreadyMarked(user_id) => {
                    tracing::debug!(user_id, "already marked today");
                }
            }
        }
    }

    tracing::info!(
        frames = summary.frames,
        marked = summary.marked.len(),
        unknown = summary.unknown_sightings,
        "session ended"
    );
    Ok(summary)
}
