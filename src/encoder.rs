use tokio_util::{bytes::BytesMut, codec::Encoder};

use crate::{error::NotifyError, notify::ScaleNotification};

/// Frames each notification as one JSON line.
#[derive(Default)]
pub struct NotificationEncoder {}

impl Encoder<ScaleNotification> for NotificationEncoder {
    type Error = NotifyError;

    fn encode(
        &mut self,
        item: ScaleNotification,
        dst: &mut BytesMut,
    ) -> std::result::Result<(), Self::Error> {
        let data = serde_json::to_vec(&item)?;
        dst.reserve(data.len() + 1);
        dst.extend_from_slice(&data);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordId;

    #[test]
    fn frames_are_newline_terminated_json() {
        let mut encoder = NotificationEncoder::default();
        let mut dst = BytesMut::new();
        for scale in [2.0, 0.5] {
            encoder
                .encode(
                    ScaleNotification {
                        record_id: RecordId::new("booking-7"),
                        scale,
                        unit: "feet".into(),
                    },
                    &mut dst,
                )
                .unwrap();
        }
        let text = std::str::from_utf8(&dst).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["recordId"], "booking-7");
        assert_eq!(first["scale"], 2.0);
        assert_eq!(first["unit"], "feet");
    }
}
