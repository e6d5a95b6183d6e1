//! CLI presentation: render records and configuration for the terminal.

use crate::config::MemogenConfig;
use crate::error::{DispenseError, StorageError};
use crate::store::RecordInfo;
use comfy_table::Table;

/// Render records as a table
pub fn format_record_list_text(records: &[RecordInfo]) -> String {
    if records.is_empty() {
        return "No stored records.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Dataname", "Digest", "Stored At", "Identity"]);
    for r in records {
        let stored_at = r.stored_at.format("%Y-%m-%d %H:%M:%S").to_string();
        table.add_row(vec![
            r.dataname.clone(),
            r.digest[..12.min(r.digest.len())].to_string(),
            stored_at,
            r.idpars.to_canonical_json(),
        ]);
    }
    table.to_string()
}

/// Render records as a JSON array
pub fn format_record_list_json(records: &[RecordInfo]) -> Result<String, DispenseError> {
    serde_json::to_string_pretty(records)
        .map_err(|e| DispenseError::Storage(StorageError::Serialization(e.to_string())))
}

/// Render the effective configuration
pub fn format_config(config: &MemogenConfig) -> Result<String, DispenseError> {
    config.to_toml()
}
