//! Idempotent table provisioning

use super::{TableHandle, TableId, WarehouseClient};
use crate::schema::TableSchema;
use crate::Result;

use tracing::{debug, info};

/// Make sure `id` exists with `schema`, creating it on a lookup miss.
///
/// Losing a creation race to a concurrent exporter counts as success.
pub async fn ensure_table(
    client: &dyn WarehouseClient,
    id: TableId,
    schema: TableSchema,
) -> Result<TableHandle> {
    let table = TableHandle::new(id, schema);
    if client.table_exists(&table.id).await? {
        return Ok(table);
    }
    create_table(client, table).await
}

/// Create `table`, swallowing an already-exists failure.
pub async fn create_table(client: &dyn WarehouseClient, table: TableHandle) -> Result<TableHandle> {
    match client.create_table(&table).await {
        Ok(()) => {
            metrics::counter!("mqexport_tables_created_total").increment(1);
            info!("Created table {}", table.id);
        }
        Err(e) if e.is_already_exists() => {
            debug!("Table {} already exists", table.id);
        }
        Err(e) => return Err(e),
    }
    Ok(table)
}
