//! The `lingua plan` command.

use anyhow::{bail, Result};
use chrono::Utc;
use comfy_table::{Cell, Table};

use lingua_core::config::load_config_from;
use lingua_core::model::{Direction, UserCardDirection, MIN_EASE_FACTOR};
use lingua_srs::plan;

use super::print_json;
use crate::GlobalOpts;

pub fn execute(
    global: &GlobalOpts,
    repetitions: u32,
    interval: u32,
    ease: f64,
    session_attempts: u32,
) -> Result<()> {
    if !ease.is_finite() || ease < MIN_EASE_FACTOR {
        bail!("ease must be at least {MIN_EASE_FACTOR}, got {ease}");
    }

    let config = load_config_from(global.config.as_deref())?;
    let now = global.now.unwrap_or_else(Utc::now);
    let mut card = UserCardDirection::new_card(0, global.user, 0, 0, Direction::SourceToTarget, now);
    card.repetitions = repetitions;
    card.interval = interval;
    card.ease_factor = ease;
    card.session_attempts = session_attempts;

    let intervals = plan(&card, config.srs.max_interval_days);
    if global.json {
        return print_json(&intervals);
    }

    let mut table = Table::new();
    table.set_header(vec!["Again", "Hard", "Good", "Easy"]);
    table.add_row(vec![
        Cell::new(format!("{}d", intervals.again)),
        Cell::new(format!("{}d", intervals.hard)),
        Cell::new(format!("{}d", intervals.good)),
        Cell::new(format!("{}d", intervals.easy)),
    ]);
    println!("{table}");
    Ok(())
}
