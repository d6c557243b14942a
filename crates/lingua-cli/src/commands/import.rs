//! The `lingua import` command.

use std::path::PathBuf;

use anyhow::Result;

use lingua_core::import::{apply_import, load_import_directory, load_import_file};

use super::Session;
use crate::GlobalOpts;

pub async fn execute(global: &GlobalOpts, path: PathBuf) -> Result<()> {
    let modules = if path.is_dir() {
        load_import_directory(&path)?
    } else {
        vec![load_import_file(&path)?]
    };

    let session = Session::open(global)?;
    for module in &modules {
        for w in &module.warnings {
            tracing::warn!(source = %module.source.display(), "{}", w.message);
        }
        let summary = apply_import(session.services.store.as_ref(), module).await?;
        println!(
            "Imported module {} \"{}\": {} lessons, {} words",
            summary.module_id, module.title, summary.lessons, summary.words
        );
    }
    session.save().await
}
