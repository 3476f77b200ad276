use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use engine_logging::engine_info;
use harvester_core::Item;

use crate::persist::{AtomicFileWriter, PersistError};

const CSV_COLUMNS: [&str; 4] = ["content", "url", "image_url", "timestamp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub item_count: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes `items` to `{dir}/feed_items_{timestamp}.{ext}` atomically.
pub fn export_items(
    dir: &Path,
    items: &[Item],
    format: ExportFormat,
    exported_at: DateTime<Utc>,
) -> Result<ExportSummary, ExportError> {
    let body = match format {
        ExportFormat::Csv => items_to_csv(items).into_bytes(),
        ExportFormat::Json => serde_json::to_vec_pretty(items)?,
    };
    let filename = format!(
        "feed_items_{}.{}",
        exported_at.format("%Y-%m-%dT%H-%M-%S"),
        format.extension()
    );

    let writer = AtomicFileWriter::new(dir.to_path_buf());
    let output_path = writer.write(&filename, &body)?;
    engine_info!("Exported {} items to {:?}", items.len(), output_path);

    Ok(ExportSummary {
        item_count: items.len(),
        output_path,
    })
}

/// CSV with a header row; every field quoted, embedded quotes doubled.
pub fn items_to_csv(items: &[Item]) -> String {
    let mut rows = Vec::with_capacity(items.len() + 1);
    rows.push(CSV_COLUMNS.join(","));
    for item in items {
        let timestamp = item.timestamp.to_rfc3339();
        let fields = [
            item.content.as_str(),
            item.url.as_str(),
            item.image_url.as_deref().unwrap_or(""),
            timestamp.as_str(),
        ];
        let row: Vec<String> = fields.iter().map(|field| quote(field)).collect();
        rows.push(row.join(","));
    }
    rows.join("\n")
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn quotes_are_doubled_and_missing_image_is_blank() {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let item = Item::new(r#"say "hi", ok"#, "https://x.test/status/1", at).unwrap();

        let csv = items_to_csv(&[item]);

        assert_eq!(
            csv,
            "content,url,image_url,timestamp\n\
             \"say \"\"hi\"\", ok\",\"https://x.test/status/1\",\"\",\"2024-05-06T07:08:09+00:00\""
        );
    }

    #[test]
    fn empty_export_is_header_only() {
        assert_eq!(items_to_csv(&[]), "content,url,image_url,timestamp");
    }
}
