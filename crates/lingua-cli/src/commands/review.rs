//! The `lingua review` command.

use anyhow::{anyhow, Result};

use lingua_core::model::Direction;
use lingua_srs::planner::AGAIN;
use lingua_srs::{ReviewInput, ReviewProcessor};

use super::{print_json, Session};
use crate::GlobalOpts;

pub async fn execute(
    global: &GlobalOpts,
    lesson: i64,
    word: i64,
    direction: String,
    quality: u8,
) -> Result<()> {
    let direction: Direction = direction.parse().map_err(|e: String| anyhow!(e))?;
    let input = ReviewInput {
        word_id: word,
        direction,
        quality,
        time_spent: None,
        user_answer: None,
    };

    let session = Session::open(global)?;
    let response = ReviewProcessor::new(session.services.clone())
        .review(global.user, lesson, input)
        .await?;
    session.save().await?;

    if global.json {
        return print_json(&response);
    }

    if quality == AGAIN {
        println!("Again: word {word} ({direction}) stays due.");
    } else {
        println!(
            "Next review of word {word} ({direction}) in {} day(s), on {}",
            response.interval,
            response.next_review.format("%Y-%m-%d")
        );
    }
    let stats = &response.daily_stats;
    println!(
        "Session: {} review(s), accuracy {:.0}%",
        stats.reviews,
        stats.accuracy()
    );
    match (response.lesson_complete, response.remaining_cards) {
        (Some(true), _) => println!("Lesson complete."),
        (_, Some(remaining)) => println!("{remaining} card(s) remaining."),
        _ => {}
    }
    Ok(())
}
