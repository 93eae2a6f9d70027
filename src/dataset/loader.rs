use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, info};

use crate::dataset::Table;
use crate::error::{PipelineError, Result};
use crate::fetch::{BasicClient, fetch_bytes, is_remote};

/// Reads the raw bytes of a local path or http(s) URL.
#[tracing::instrument(fields(source = %source))]
pub async fn read_source(source: &str) -> Result<Vec<u8>> {
    let bytes = if is_remote(source) {
        let client = BasicClient::new();
        fetch_bytes(&client, source)
            .await
            .map_err(|e| PipelineError::Fetch {
                source_name: source.to_string(),
                message: e.to_string(),
            })?
    } else {
        std::fs::read(source)?
    };
    debug!(bytes = bytes.len(), "Source bytes read");
    Ok(bytes)
}

/// Loads a CSV source into a [`Table`], gunzipping `.gz` sources first.
pub async fn load(source: &str) -> Result<Table> {
    let bytes = read_source(source).await?;
    let table = parse_bytes(source, &bytes)?;
    info!(
        source,
        rows = table.len(),
        columns = table.columns().len(),
        "Dataset loaded"
    );
    Ok(table)
}

pub(crate) fn parse_bytes(source: &str, bytes: &[u8]) -> Result<Table> {
    let name = display_name(source);
    if source.ends_with(".gz") {
        let mut text = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut text)?;
        Table::from_reader(&name, text.as_slice())
    } else {
        Table::from_reader(&name, bytes)
    }
}

fn display_name(source: &str) -> String {
    if is_remote(source) {
        return source.to_string();
    }
    Path::new(source)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn test_parse_plain_bytes() {
        let table = parse_bytes("data/admissions.csv", b"Date,Admissions\n2024-01-01,3\n").unwrap();
        assert_eq!(table.name(), "admissions.csv");
        assert_eq!(table.columns(), &["date", "admissions"]);
    }

    #[test]
    fn test_parse_gzip_bytes() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"date,staff_count\n2024-01-01,12\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let table = parse_bytes("staff.csv.gz", &compressed).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 1), "12");
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let result = load("/definitely/not/here.csv").await;
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }
}
