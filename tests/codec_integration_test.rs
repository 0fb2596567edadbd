//! Integration tests for the frame codec
//!
//! The decoder must produce the same documents no matter how the byte
//! stream is sliced into chunks, including slices that cut the delimiter
//! itself apart.

use serde_json::{json, Value};
use strata::extractor::codec::{encode_frame, JsonDecoder, DEFAULT_DELIMITER};

fn sample_documents() -> Vec<Value> {
    vec![
        json!({"id": "1", "name": "alice", "tags": ["a", "b"]}),
        json!({"id": "2", "nested": {"deep": {"value": 42}}}),
        json!({"id": "3", "text": "dashes --- inside a value"}),
        json!({"id": "4", "unicode": "příliš žluťoučký kůň"}),
        json!({"id": "5"}),
    ]
}

fn encoded_stream(documents: &[Value]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for document in documents {
        bytes.extend(encode_frame(document, DEFAULT_DELIMITER.as_bytes()).unwrap());
    }
    bytes
}

fn decode_in_chunks(bytes: &[u8], chunk_size: usize) -> Vec<Value> {
    let mut decoder = JsonDecoder::new(DEFAULT_DELIMITER);
    let mut documents = Vec::new();
    let mut sink = |document| {
        documents.push(document);
        Ok(())
    };
    for chunk in bytes.chunks(chunk_size) {
        decoder.decode_chunk(chunk, &mut sink).unwrap();
    }
    decoder.finalize(&mut sink).unwrap();
    documents
}

#[test]
fn test_decoding_is_independent_of_chunk_boundaries() {
    let documents = sample_documents();
    let bytes = encoded_stream(&documents);

    for chunk_size in [1, 2, 3, 5, 7, 16, 64, bytes.len()] {
        assert_eq!(
            decode_in_chunks(&bytes, chunk_size),
            documents,
            "chunk size {chunk_size} changed the decoded documents"
        );
    }
}

#[test]
fn test_unterminated_final_frame_is_recovered() {
    let documents = sample_documents();
    let mut bytes = encoded_stream(&documents);
    // Strip the trailing delimiter; the last frame now ends at EOF.
    bytes.truncate(bytes.len() - DEFAULT_DELIMITER.len());

    assert_eq!(decode_in_chunks(&bytes, 11), documents);
}

#[test]
fn test_delimiter_lookalike_inside_a_value_is_not_a_boundary() {
    // A JSON string can never contain the raw delimiter (its newlines are
    // escaped), but it can contain the dashes. They must pass through.
    let document = json!({"id": "1", "note": "--- not a frame break ---"});
    let bytes = encode_frame(&document, DEFAULT_DELIMITER.as_bytes()).unwrap();

    let mut decoder = JsonDecoder::new(DEFAULT_DELIMITER);
    let mut decoded = Vec::new();
    let mut sink = |d| {
        decoded.push(d);
        Ok(())
    };
    decoder.decode_chunk(&bytes, &mut sink).unwrap();
    decoder.finalize(&mut sink).unwrap();
    assert_eq!(decoded, vec![document]);
}

#[test]
fn test_documents_ahead_of_corruption_are_delivered_for_any_chunking() {
    // Delivery of the leading documents must not depend on whether the
    // corrupt frame shares a chunk with them.
    let mut bytes = encoded_stream(&sample_documents()[..2]);
    bytes.extend(b"corrupt");
    bytes.extend(DEFAULT_DELIMITER.as_bytes());

    for chunk_size in [1, 7, bytes.len()] {
        let mut decoder = JsonDecoder::new(DEFAULT_DELIMITER);
        let mut decoded = Vec::new();
        let mut sink = |d| {
            decoded.push(d);
            Ok(())
        };
        let mut failure = None;
        for chunk in bytes.chunks(chunk_size) {
            if let Err(e) = decoder.decode_chunk(chunk, &mut sink) {
                failure = Some(e);
                break;
            }
        }
        assert!(failure.is_some(), "chunk size {chunk_size} did not fail");
        assert_eq!(decoded, sample_documents()[..2].to_vec());
    }
}
