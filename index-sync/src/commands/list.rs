use crate::core::client::IndexStore;
use crate::core::reconcile::{list_collections, read_inventory, Inventory};
use crate::error::IndexSyncResult;
use crate::utils::format::render_inventory;
use tokio_util::sync::CancellationToken;

/// Every collection in scope with its indexes. Only collection enumeration can fail.
pub async fn run(store: &dyn IndexStore, scope: &[String], cancel: &CancellationToken) -> IndexSyncResult<Inventory> {
    let names = list_collections(store, scope).await?;
    Ok(read_inventory(store, &names, cancel).await)
}

pub fn render(label: &str, database: &str, inventory: &Inventory) -> String {
    render_inventory(label, database, inventory)
}
