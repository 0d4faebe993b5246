use super::vector_models::{chunk_record_id, ChunkMetadata};
use crate::core::documents::DocumentMetadata;
use crate::core::errors::RagError;

/// Builds the id and metadata for every flattened chunk.
///
/// `origin_indexes[i]` selects the parent document of chunk `i` from
/// `doc_metadatas`, and `chunk_seq_numbers[i]` is its position in that
/// document. Output order matches input order, so the result lines up with the
/// embedding output it was produced alongside.
pub fn correlate(
    doc_metadatas: &[DocumentMetadata],
    origin_indexes: &[usize],
    chunk_seq_numbers: &[usize],
) -> Result<(Vec<String>, Vec<ChunkMetadata>), RagError> {
    if origin_indexes.len() != chunk_seq_numbers.len() {
        return Err(RagError::LengthMismatch {
            left_name: "origin_indexes",
            left: origin_indexes.len(),
            right_name: "chunk_seq_numbers",
            right: chunk_seq_numbers.len(),
        });
    }

    let mut ids = Vec::with_capacity(origin_indexes.len());
    let mut metadatas = Vec::with_capacity(origin_indexes.len());

    for (position, (&origin, &seq)) in origin_indexes.iter().zip(chunk_seq_numbers).enumerate() {
        let doc = doc_metadatas
            .get(origin)
            .ok_or(RagError::InvalidOrigin {
                position,
                origin,
                documents: doc_metadatas.len(),
            })?;

        ids.push(chunk_record_id(&doc.document_id, seq));
        metadatas.push(ChunkMetadata {
            document_id: doc.document_id.clone(),
            title: doc.title.clone(),
            chunk_seq_number: seq,
        });
    }

    Ok((ids, metadatas))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, title: &str) -> DocumentMetadata {
        DocumentMetadata {
            document_id: id.to_string(),
            title: title.to_string(),
        }
    }

    #[test]
    fn test_ids_are_deterministic() {
        let (ids, metadatas) = correlate(&[meta("d1", "First")], &[0, 0], &[0, 1]).unwrap();

        assert_eq!(ids, vec!["d1__chunk_id=0", "d1__chunk_id=1"]);
        assert_eq!(metadatas[1].title, "First");
        assert_eq!(metadatas[1].chunk_seq_number, 1);
    }

    #[test]
    fn test_chunks_resolve_to_their_own_document() {
        let docs = [meta("a", "A"), meta("b", "B"), meta("c", "C")];
        let (ids, metadatas) = correlate(&docs, &[0, 2, 2, 2], &[0, 0, 1, 2]).unwrap();

        assert_eq!(
            ids,
            vec![
                "a__chunk_id=0",
                "c__chunk_id=0",
                "c__chunk_id=1",
                "c__chunk_id=2"
            ]
        );
        assert!(metadatas[1..].iter().all(|m| m.document_id == "c" && m.title == "C"));
    }

    #[test]
    fn test_empty_input() {
        let (ids, metadatas) = correlate(&[], &[], &[]).unwrap();
        assert!(ids.is_empty());
        assert!(metadatas.is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let result = correlate(&[meta("d1", "T")], &[0, 0], &[0]);
        assert!(matches!(result, Err(RagError::LengthMismatch { .. })));
    }

    #[test]
    fn test_origin_out_of_range() {
        let result = correlate(&[meta("d1", "T")], &[0, 1], &[0, 0]);
        assert!(matches!(
            result,
            Err(RagError::InvalidOrigin {
                position: 1,
                origin: 1,
                documents: 1
            })
        ));
    }
}
