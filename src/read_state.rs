use std::path::Path;

use tokio::io::AsyncReadExt;
use tokio_util::{bytes::BytesMut, codec::Decoder};
use tracing::{debug, warn};

use crate::{PickEvent, decoder::PickEventDecoder, error::ScriptError};

/// Reads every event of a pick script.
pub async fn load(events_file: &Path) -> Result<Vec<PickEvent>, ScriptError> {
    let mut file = tokio::fs::File::open(events_file).await?;
    let mut contents = BytesMut::with_capacity(4096);
    while file.read_buf(&mut contents).await? > 0 {}

    let mut decoder = PickEventDecoder::default();
    let mut events = vec![];
    while let Some(event) = decoder.decode_eof(&mut contents)? {
        events.push(event);
    }
    if events.is_empty() {
        warn!("no events in {}", events_file.display());
    }
    debug!("loaded {} events from {}", events.len(), events_file.display());
    Ok(events)
}
