//! The `lingua access` command.

use anyhow::Result;

use lingua_core::access::AccessGatekeeper;

use super::{print_json, Session};
use crate::GlobalOpts;

pub async fn execute(global: &GlobalOpts, module: i64) -> Result<()> {
    let session = Session::open(global)?;
    let access = AccessGatekeeper::new(session.services.clone())
        .module_access(global.user, module)
        .await?;

    if global.json {
        return print_json(&access);
    }

    if access.accessible {
        println!("Module {module}: open");
    } else {
        println!("Module {module}: locked");
        for reason in &access.locked_reasons {
            println!("  - {reason}");
        }
    }
    if let Some(ratio) = access.completion_ratio {
        println!("Previous module completed: {:.0}%", ratio * 100.0);
    }
    Ok(())
}
