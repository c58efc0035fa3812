// Ordered Enumerator - queue children keyed in dequeue order

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::domain::PriorityCodec;
use crate::error::Result;
use crate::port::{ChildWatcher, CoordinationClient};

/// Children of `root` as a map from sort key to child name, ascending.
///
/// The watcher, if any, is armed atomically with the listing. Names outside
/// the codec's grammar are logged and skipped. A missing root surfaces as the
/// service's `NoNode` error so callers can tell it apart from an empty queue.
pub async fn ordered_children<C: PriorityCodec>(
    client: &dyn CoordinationClient,
    codec: &C,
    root: &str,
    watcher: Option<Arc<dyn ChildWatcher>>,
) -> Result<BTreeMap<C::Key, String>> {
    let child_names = client.get_children(root, watcher).await?;

    let mut ordered = BTreeMap::new();
    for child_name in child_names {
        if !codec.is_valid_name(&child_name) {
            warn!(root = %root, child = %child_name, "Found child node with improper name");
            continue;
        }
        match codec.sort_key(&child_name) {
            Ok(key) => {
                ordered.insert(key, child_name);
            }
            Err(e) => {
                warn!(
                    root = %root,
                    child = %child_name,
                    error = %e,
                    "Found child node with improper format"
                );
            }
        }
    }

    Ok(ordered)
}
