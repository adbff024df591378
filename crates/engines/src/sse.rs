//! Server-sent-events decoding for streaming engines.
//!
//! [`drain_data_lines`] pulls complete `data:` payloads out of a byte buffer;
//! [`sse_event_stream`] turns a `reqwest::Response` into a [`BoxStream`] of
//! engine events using an engine-specific payload parser.

use crate::util::from_reqwest;
use ac_domain::error::Result;
use ac_domain::stream::{BoxStream, StreamEvent};

/// Extract complete `data:` payloads from an SSE buffer.
///
/// Events are delimited by a blank line. Only `data:` lines are kept;
/// consumed bytes are removed and a trailing partial event stays buffered.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos + 2).collect();
        data_lines.extend(
            block
                .lines()
                .filter_map(|line| line.trim().strip_prefix("data:"))
                .map(str::trim)
                .filter(|data| !data.is_empty())
                .map(String::from),
        );
    }

    data_lines
}

/// Build an event stream from an SSE response.
///
/// `parse_data` maps each `data:` payload to zero or more events. The stream
/// ends after the response body closes (flushing a final unterminated event)
/// or after the first transport error, which is yielded as `Err`.
pub(crate) fn sse_event_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();

        loop {
            let finished = match response.chunk().await {
                Ok(Some(bytes)) => {
                    // Normalize CRLF framing so the blank-line split works.
                    buffer.push_str(&String::from_utf8_lossy(&bytes).replace("\r\n", "\n"));
                    false
                }
                Ok(None) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                    }
                    true
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            };

            for data in drain_data_lines(&mut buffer) {
                for event in parse_data(&data) {
                    yield event;
                }
            }

            if finished {
                break;
            }
        }
    };

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_openai_style_chunks() {
        let mut buf = String::from(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n",
        );
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "[DONE]");
        assert!(buf.is_empty());
    }

    #[test]
    fn keeps_partial_event_until_terminated() {
        let mut buf = String::from("data: one\n\ndata: tw");
        assert_eq!(drain_data_lines(&mut buf), vec!["one"]);
        assert_eq!(buf, "data: tw");
        buf.push_str("o\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["two"]);
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut buf = String::from(": keep-alive\nevent: chunk\nid: 7\ndata: x\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["x"]);
    }

    #[test]
    fn skips_empty_payloads() {
        let mut buf = String::from("data:\n\ndata:   \n\n");
        assert!(drain_data_lines(&mut buf).is_empty());
        assert!(buf.is_empty());
    }
}
