//! Payload codec: raw delivery → `Message`.

use tokio::time::Instant;

use crate::domain::{DecodeError, Message, PublishedMessage, RawDelivery};

/// Decode a JSON `PublishedMessage` payload, stamping it with `deadline`.
pub fn decode(raw: &RawDelivery, deadline: Instant) -> Result<Message, DecodeError> {
    let published: PublishedMessage =
        serde_json::from_slice(&raw.data).map_err(|source| DecodeError {
            ack_id: raw.ack_id.clone(),
            source,
        })?;
    Ok(Message::new(
        published,
        raw.data.clone(),
        raw.attributes.clone(),
        deadline,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn decodes_well_formed_payload() {
        let raw = RawDelivery::new(
            "a1",
            r#"{"id":"42","key":"k","content":"hello","filename":"hello.txt"}"#,
        )
        .with_attribute("origin", "test");
        let deadline = Instant::now();

        let msg = decode(&raw, deadline).unwrap();

        assert_eq!(msg.id(), "42");
        assert_eq!(msg.key(), "k");
        assert_eq!(msg.content(), b"hello");
        assert_eq!(msg.payload(), raw.data.as_slice());
        assert_eq!(msg.object_name(), "hello.txt");
        assert_eq!(msg.attributes().get("origin").map(String::as_str), Some("test"));
        assert_eq!(msg.deadline(), deadline);
    }

    #[rstest]
    #[case::not_json("hello")]
    #[case::truncated(r#"{"id":"1","key":"k""#)]
    #[case::missing_filename(r#"{"id":"1","key":"k","content":"c"}"#)]
    #[case::wrong_type(r#"{"id":1,"key":"k","content":"c","filename":"f"}"#)]
    #[case::array("[]")]
    fn malformed_payloads_are_decode_errors(#[case] payload: &str) {
        let raw = RawDelivery::new("bad", payload);
        let err = decode(&raw, Instant::now()).unwrap_err();
        assert_eq!(err.ack_id, "bad");
    }
}
