use crate::api::FeedbackRecord;
use crate::error::{AppError, Result};
use crate::model::EntityResult;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Build the quality-tracking record for a result's narrative. The edited
/// text is only sent when it differs from the generated baseline.
pub fn feedback_record(result: &EntityResult, rating: u8, comment: &str) -> Result<FeedbackRecord> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::InvalidData(format!(
            "Rating {} must be between {} and {}",
            rating, MIN_RATING, MAX_RATING
        )));
    }

    let narrative = &result.narrative;
    let edited = narrative.is_edited();

    Ok(FeedbackRecord {
        entity_id: result.id,
        edited,
        original: narrative.original().map(str::to_string),
        edited_text: if edited {
            narrative.current().map(str::to_string)
        } else {
            None
        },
        rating,
        comment: comment.trim().to_string(),
    })
}
