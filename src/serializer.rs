use crate::record::TraceRecord;
use serde::Serialize;
use std::borrow::Cow;
use std::io::{self, Write};

#[derive(Clone, Copy, Eq, PartialEq, Serialize)]
enum EventType {
    #[serde(rename = "X")]
    Complete,
}

/// Wire view of one record. Field names and order follow the trace viewer
/// format; only complete events are emitted.
#[derive(Serialize)]
struct ChromeEvent<'a> {
    #[serde(rename = "cat")]
    category: &'static str,
    #[serde(rename = "dur")]
    duration: i64,
    name: &'a str,
    #[serde(rename = "ph")]
    event_type: EventType,
    #[serde(rename = "pid")]
    process_id: u32,
    #[serde(rename = "tid")]
    thread_id: u64,
    #[serde(rename = "ts")]
    timestamp: i64,
}

/// Emits the opening framing bytes of the trace container. Written exactly
/// once per session, before any record.
pub(crate) fn write_header(sink: &mut impl Write) -> io::Result<()> {
    sink.write_all(b"{\"otherData\": {},\"traceEvents\":[")
}

/// Emits the closing framing bytes, exactly once, after the last record.
pub(crate) fn write_footer(sink: &mut impl Write) -> io::Result<()> {
    sink.write_all(b"]}")
}

/// Emits one record as a self-contained JSON object, preceded by a separator
/// comma for every record except the first in the session.
pub(crate) fn write_record(
    sink: &mut impl Write,
    record: &TraceRecord,
    is_first: bool,
) -> io::Result<()> {
    if !is_first {
        sink.write_all(b",")?;
    }

    let name = sanitize_name(&record.name);
    let event = ChromeEvent {
        category: "function",
        duration: record.end_micros - record.start_micros,
        name: &*name,
        event_type: EventType::Complete,
        process_id: 0,
        thread_id: record.producer_id,
        timestamp: record.start_micros,
    };

    serde_json::to_writer(sink, &event).map_err(io::Error::from)
}

/// Double quotes are replaced with apostrophes before the name is embedded;
/// backslashes and control characters are left alone here and escaped by the
/// JSON serializer.
fn sanitize_name(name: &str) -> Cow<'_, str> {
    if name.contains('"') {
        log::warn!(
            "trace record name {:?} contains double quotes, replacing with apostrophes",
            name
        );
        Cow::Owned(name.replace('"', "'"))
    } else {
        Cow::Borrowed(name)
    }
}

#[cfg(test)]
mod tests {
    use super::{write_footer, write_header, write_record};
    use crate::record::TraceRecord;

    fn render(records: &[TraceRecord]) -> String {
        let mut out = Vec::new();
        write_header(&mut out).unwrap();
        for (i, record) in records.iter().enumerate() {
            write_record(&mut out, record, i == 0).unwrap();
        }
        write_footer(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn record_matches_the_wire_format_exactly() {
        let mut out = Vec::new();
        let record = TraceRecord::new("compute", 1000, 2500, 7);
        write_record(&mut out, &record, true).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"cat":"function","dur":1500,"name":"compute","ph":"X","pid":0,"tid":7,"ts":1000}"#
        );
    }

    #[test]
    fn records_after_the_first_get_a_leading_comma() {
        let rendered = render(&[
            TraceRecord::new("a", 0, 1, 0),
            TraceRecord::new("b", 1, 2, 0),
        ]);

        assert!(rendered.starts_with("{\"otherData\": {},\"traceEvents\":["));
        assert!(rendered.ends_with("]}"));
        assert!(rendered.contains(r#"},{"cat""#));

        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["traceEvents"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn double_quotes_become_apostrophes() {
        let rendered = render(&[TraceRecord::new(r#"He said "hi""#, 0, 1, 0)]);

        assert!(rendered.contains(r#""name":"He said 'hi'""#));
        serde_json::from_str::<serde_json::Value>(&rendered).unwrap();
    }

    #[test]
    fn backslashes_and_control_characters_still_yield_valid_json() {
        let hostile = "back\\slash\nand\tcontrol";
        let rendered = render(&[TraceRecord::new(hostile, 0, 1, 0)]);

        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["traceEvents"][0]["name"], hostile);
    }

    #[test]
    fn empty_session_is_still_a_valid_container() {
        let rendered = render(&[]);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["traceEvents"].as_array().unwrap().len(), 0);
    }
}
