//! JSON-lines tick feed: one `{"symbol", "timestamp", "price", "volume"}`
//! object per line. Blank lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::types::TickMessage;

pub fn parse_jsonl(reader: impl BufRead) -> EngineResult<Vec<TickMessage>> {
    let mut ticks = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let tick: TickMessage = serde_json::from_str(trimmed).map_err(|e| EngineError::Feed {
            line: index + 1,
            message: e.to_string(),
        })?;
        ticks.push(tick);
    }
    Ok(ticks)
}

pub fn read_jsonl(path: impl AsRef<Path>) -> EngineResult<Vec<TickMessage>> {
    let path = path.as_ref();
    let ticks = parse_jsonl(BufReader::new(File::open(path)?))?;
    info!(path = %path.display(), ticks = ticks.len(), "Loaded tick feed");
    Ok(ticks)
}
