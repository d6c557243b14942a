//! The `lingua due` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use lingua_srs::CardSelector;

use super::{print_json, Session};
use crate::GlobalOpts;

pub async fn execute(global: &GlobalOpts, lesson: i64, seed: Option<u64>) -> Result<()> {
    let session = Session::open(global)?;
    let mut selector = CardSelector::new(session.services.clone());
    if let Some(seed) = seed {
        selector = selector.with_seed(seed);
    }
    let working_set = selector.working_set(global.user, lesson).await?;
    // Selecting may have added the lesson's words to the learner's inventory.
    session.save().await?;

    if global.json {
        return print_json(&working_set);
    }

    if working_set.cards.is_empty() {
        match &working_set.next_review_time {
            Some(wait) => println!("No cards due. Next review in {wait}."),
            None => println!("No cards due."),
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Word", "Direction", "Prompt", "Answer", "New", "Hard", "Good", "Easy",
    ]);
    for card in &working_set.cards {
        table.add_row(vec![
            Cell::new(card.word_id),
            Cell::new(card.direction),
            Cell::new(&card.prompt),
            Cell::new(&card.answer),
            Cell::new(if card.is_new { "yes" } else { "" }),
            Cell::new(format!("{}d", card.intervals.hard)),
            Cell::new(format!("{}d", card.intervals.good)),
            Cell::new(format!("{}d", card.intervals.easy)),
        ]);
    }
    println!("{table}");

    let stats = &working_set.stats;
    println!(
        "{} card(s) due: {} review(s) of {}, {} new of {}",
        working_set.total_due,
        stats.review_cards,
        stats.review_limit,
        stats.new_cards,
        stats.new_limit
    );
    Ok(())
}
