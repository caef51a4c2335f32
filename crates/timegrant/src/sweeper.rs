//! Sweeper: drops resolved grants from the index.

use tracing::{debug, info};

use crate::index::GrantIndex;

/// Remove every terminal grant from `index`. Returns how many were removed.
///
/// Non-terminal grants are never touched. Buckets left empty are dropped.
pub fn sweep(index: &GrantIndex) -> usize {
    let removed = index.remove_terminal();
    if removed > 0 {
        info!(removed, remaining = index.len(), "swept resolved grants");
    } else {
        debug!("sweep found nothing to remove");
    }
    removed
}
