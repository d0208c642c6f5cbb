use tokio_util::{bytes::BytesMut, codec::Decoder};
use tracing::trace;

use crate::{PickEvent, error::ScriptError};

/// Splits a pick script into events, one JSON object per line.
#[derive(Default)]
pub struct PickEventDecoder {
    line: usize,
}

impl PickEventDecoder {
    fn parse_line(&mut self, raw: &[u8]) -> Result<Option<PickEvent>, ScriptError> {
        self.line += 1;
        let trimmed = raw.trim_ascii();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let event = serde_json::from_slice(trimmed).map_err(|source| ScriptError::Malformed {
            line: self.line,
            source,
        })?;
        trace!("line {}: {:?}", self.line, event);
        Ok(Some(event))
    }
}

impl Decoder for PickEventDecoder {
    type Item = PickEvent;

    type Error = ScriptError;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        while let Some(end) = src.iter().position(|byte| *byte == b'\n') {
            let raw = src.split_to(end + 1);
            if let Some(event) = self.parse_line(&raw)? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    fn decode_eof(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // last line without a trailing newline
        let raw = src.split();
        self.parse_line(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(text: &str) -> Result<Vec<PickEvent>, ScriptError> {
        let mut decoder = PickEventDecoder::default();
        let mut src = BytesMut::from(text.as_bytes());
        let mut events = vec![];
        while let Some(event) = decoder.decode_eof(&mut src)? {
            events.push(event);
        }
        Ok(events)
    }

    #[test]
    fn decodes_every_event_kind() {
        let events = decode_all(concat!(
            "{\"kind\":\"pick2d\",\"x\":100,\"y\":100}\n",
            "{\"kind\":\"pick3d\",\"x\":0,\"y\":0,\"z\":0}\n",
            "{\"kind\":\"compute\"}\n",
            "{\"kind\":\"reset\"}\n",
            "{\"kind\":\"calibrate\",\"distance\":12.5}\n",
            "{\"kind\":\"finalize\"}\n",
        ))
        .unwrap();
        assert_eq!(
            events,
            vec![
                PickEvent::Pick2d { x: 100.0, y: 100.0 },
                PickEvent::Pick3d {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0
                },
                PickEvent::Compute,
                PickEvent::Reset,
                PickEvent::Calibrate { distance: 12.5 },
                PickEvent::Finalize,
            ]
        );
    }

    #[test]
    fn skips_blank_lines_and_reads_unterminated_tail() {
        let events = decode_all("\n  \n{\"kind\":\"reset\"}\r\n\n{\"kind\":\"compute\"}").unwrap();
        assert_eq!(events, vec![PickEvent::Reset, PickEvent::Compute]);
    }

    #[test]
    fn partial_line_waits_for_more_input() {
        let mut decoder = PickEventDecoder::default();
        let mut src = BytesMut::from(&b"{\"kind\":\"res"[..]);
        assert!(decoder.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(b"et\"}\n");
        assert_eq!(decoder.decode(&mut src).unwrap(), Some(PickEvent::Reset));
    }

    #[test]
    fn malformed_line_names_its_number() {
        let error = decode_all("{\"kind\":\"reset\"}\n\n{\"kind\":\"jump\"}\n").unwrap_err();
        assert!(matches!(error, ScriptError::Malformed { line: 3, .. }));
    }
}
