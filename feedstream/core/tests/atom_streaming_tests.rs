//! Atom documents consumed through a streaming result

use std::io::Cursor;

use futures::StreamExt;
use pretty_assertions::assert_eq;

use feedstream_core::{
    AtomEntry, AtomEntryReader, DecodeError, ProductionState, RecordReaderExt, StreamingResult,
};

const JOBS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
      xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <title>Jobs</title>
  <entry>
    <id>urn:job:1</id>
    <content type="application/xml">
      <m:properties><d:Name>compact</d:Name><d:Attempts>1</d:Attempts></m:properties>
    </content>
  </entry>
  <entry>
    <id>urn:job:2</id>
    <content type="application/xml">
      <m:properties><d:Name>reindex</d:Name><d:Attempts>4</d:Attempts></m:properties>
    </content>
  </entry>
  <entry>
    <id>urn:job:3</id>
    <content type="application/xml">
      <m:properties><d:Name>vacuum</d:Name><d:Attempts>0</d:Attempts></m:properties>
    </content>
  </entry>
</feed>"#;

#[derive(Debug, PartialEq)]
struct Job {
    name: String,
    attempts: u32,
}

fn to_job(entry: AtomEntry) -> Result<Job, DecodeError> {
    let name = entry
        .property("Name")
        .ok_or_else(|| DecodeError::InvalidRecord("job without Name".to_string()))?
        .to_string();
    let attempts = entry.property_as("Attempts")?.unwrap_or(0);
    Ok(Job { name, attempts })
}

fn atom_reader(xml: &'static str) -> AtomEntryReader<Cursor<&'static [u8]>> {
    AtomEntryReader::new(Cursor::new(xml.as_bytes()))
}

#[test]
fn test_pull_entries_from_document() {
    let result = StreamingResult::wrap(atom_reader(JOBS));

    let ids: Vec<String> = result
        .iter()
        .unwrap()
        .map(|entry| entry.unwrap().id.unwrap())
        .collect();

    assert_eq!(ids, vec!["urn:job:1", "urn:job:2", "urn:job:3"]);
    assert_eq!(result.read_count(), 3);
    assert_eq!(result.state(), ProductionState::Finished);
}

#[test]
fn test_typed_jobs() {
    let result = StreamingResult::wrap(atom_reader(JOBS).map_records(to_job));

    let jobs: Vec<Job> = result.iter().unwrap().map(Result::unwrap).collect();

    assert_eq!(
        jobs,
        vec![
            Job { name: "compact".to_string(), attempts: 1 },
            Job { name: "reindex".to_string(), attempts: 4 },
            Job { name: "vacuum".to_string(), attempts: 0 },
        ]
    );
}

#[test]
fn test_unconvertible_entry_faults_stream() {
    let xml = r#"<feed>
  <entry><content><properties><Name>ok</Name></properties></content></entry>
  <entry><content><properties><Attempts>many</Attempts></properties></content></entry>
  <entry><content><properties><Name>unreached</Name></properties></content></entry>
</feed>"#;
    let result = StreamingResult::wrap(atom_reader(xml).map_records(to_job));

    let items: Vec<_> = result.iter().unwrap().collect();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().name, "ok");
    let error = items[1].as_ref().unwrap_err();
    assert!(error.to_string().contains("job without Name"), "got {error}");
    assert_eq!(result.state(), ProductionState::Faulted);
}

#[tokio::test]
async fn test_truncated_document_faults_async_stream() {
    let xml = "<feed><entry><id>a</id></entry><entry><id>b</id></entry><entry><id>c";
    let result = StreamingResult::wrap(atom_reader(xml));
    let mut stream = result.stream().unwrap();

    assert_eq!(stream.next().await.unwrap().unwrap().id.as_deref(), Some("a"));
    assert_eq!(stream.next().await.unwrap().unwrap().id.as_deref(), Some("b"));

    let error = stream.next().await.unwrap().unwrap_err();
    let decode = error.decode_error().expect("decode error");
    assert!(
        matches!(
            **decode,
            DecodeError::UnexpectedEof { .. } | DecodeError::Xml { .. }
        ),
        "got {decode:?}"
    );
    assert!(stream.next().await.is_none());

    assert_eq!(result.read_count(), 2);
    assert!(result.last_error().is_some());
}

#[test]
fn test_entry_document_yields_single_record() {
    let result = StreamingResult::wrap(atom_reader(
        "<entry><id>urn:job:9</id><title>Only</title></entry>",
    ));

    let entries: Vec<AtomEntry> = result.iter().unwrap().map(Result::unwrap).collect();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title.as_deref(), Some("Only"));
}
