use crate::types::{ChunkResult, Segment, Transcript};

/// Tolerance for adjacent-segment ordering. Providers round segment bounds
/// to centiseconds, so exact `end <= next.start` is too strict at chunk
/// boundaries.
pub const EPSILON: f64 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no result for chunk {index} ({got} of {expected} chunks present)")]
    MissingChunk {
        index: usize,
        got: usize,
        expected: usize,
    },
    #[error("duplicate result for chunk {index}")]
    DuplicateChunk { index: usize },
    #[error("result for unknown chunk {index} (plan has {expected} chunks)")]
    UnknownChunk { index: usize, expected: usize },
    #[error(
        "segments not monotonic at {position}: [{prev_start:.2}, {prev_end:.2}) followed by [{next_start:.2}, {next_end:.2})"
    )]
    NonMonotonic {
        position: usize,
        prev_start: f64,
        prev_end: f64,
        next_start: f64,
        next_end: f64,
    },
}

/// Reassemble per-chunk results into one transcript on the original timeline.
///
/// `offsets` are the planned chunk start offsets in seconds, in index order;
/// `duration` is the source file's total duration. Every chunk must be
/// present exactly once. Chunks are concatenated in index order after each
/// segment is shifted by its chunk's start offset, and the combined sequence
/// is then verified to be time-sorted within [`EPSILON`]. Non-overlapping
/// chunk windows make ordering hold by construction, but that is a property
/// to check, not to assume.
pub fn merge(
    offsets: &[f64],
    duration: f64,
    results: Vec<ChunkResult>,
) -> Result<Transcript, MergeError> {
    let expected = offsets.len();
    let mut slots: Vec<Option<ChunkResult>> = (0..expected).map(|_| None).collect();

    let got = results.len();
    for result in results {
        let slot = slots
            .get_mut(result.index)
            .ok_or(MergeError::UnknownChunk {
                index: result.index,
                expected,
            })?;
        if slot.is_some() {
            return Err(MergeError::DuplicateChunk {
                index: result.index,
            });
        }
        *slot = Some(result);
    }

    let mut language = None;
    let mut segments: Vec<Segment> = Vec::new();

    for (index, slot) in slots.into_iter().enumerate() {
        let result = slot.ok_or(MergeError::MissingChunk {
            index,
            got,
            expected,
        })?;
        if language.is_none() {
            language = result.language.clone();
        }
        let offset = offsets[index];
        segments.extend(result.segments.iter().map(|s| s.shifted(offset)));
    }

    verify_monotonic(&segments)?;

    let text = segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Transcript {
        text,
        segments,
        language,
        duration,
    })
}

fn verify_monotonic(segments: &[Segment]) -> Result<(), MergeError> {
    for (i, pair) in segments.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.start > next.start + EPSILON || prev.end > next.start + EPSILON {
            return Err(MergeError::NonMonotonic {
                position: i + 1,
                prev_start: prev.start,
                prev_end: prev.end,
                next_start: next.start,
                next_end: next.end,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, segments: Vec<Segment>) -> ChunkResult {
        ChunkResult {
            index,
            language: Some("en".to_string()),
            segments,
        }
    }

    #[test]
    fn merge_shifts_segments_by_chunk_offset() {
        let offsets = [0.0, 600.0, 1200.0];
        let results = vec![
            chunk(0, vec![Segment::new(10.0, 20.0, "one")]),
            chunk(1, vec![Segment::new(10.0, 20.0, "two")]),
            chunk(2, vec![Segment::new(10.0, 20.0, "three")]),
        ];

        let transcript = merge(&offsets, 1800.0, results).unwrap();

        let bounds: Vec<(f64, f64)> = transcript
            .segments
            .iter()
            .map(|s| (s.start, s.end))
            .collect();
        assert_eq!(
            bounds,
            vec![(10.0, 20.0), (610.0, 620.0), (1210.0, 1220.0)]
        );
        assert_eq!(transcript.text, "one two three");
        assert_eq!(transcript.duration, 1800.0);
        assert_eq!(transcript.language.as_deref(), Some("en"));
    }

    #[test]
    fn merge_accepts_out_of_order_results() {
        let offsets = [0.0, 600.0];
        let results = vec![
            chunk(1, vec![Segment::new(5.0, 8.0, "later")]),
            chunk(0, vec![Segment::new(1.0, 4.0, "earlier")]),
        ];

        let transcript = merge(&offsets, 1200.0, results).unwrap();
        assert_eq!(transcript.text, "earlier later");
    }

    #[test]
    fn merge_fails_on_missing_chunk() {
        let offsets = [0.0, 600.0, 1200.0];
        let results = vec![
            chunk(0, vec![Segment::new(0.0, 1.0, "a")]),
            chunk(2, vec![Segment::new(0.0, 1.0, "c")]),
        ];

        let err = merge(&offsets, 1800.0, results).unwrap_err();
        assert!(matches!(err, MergeError::MissingChunk { index: 1, .. }));
    }

    #[test]
    fn merge_fails_on_duplicate_chunk() {
        let offsets = [0.0, 600.0];
        let results = vec![
            chunk(0, vec![]),
            chunk(0, vec![]),
        ];

        let err = merge(&offsets, 1200.0, results).unwrap_err();
        assert!(matches!(err, MergeError::DuplicateChunk { index: 0 }));
    }

    #[test]
    fn merge_fails_on_unknown_chunk_index() {
        let offsets = [0.0];
        let results = vec![chunk(3, vec![])];

        let err = merge(&offsets, 600.0, results).unwrap_err();
        assert!(matches!(err, MergeError::UnknownChunk { index: 3, .. }));
    }

    #[test]
    fn merge_rejects_non_monotonic_segments() {
        // Offsets deliberately inverted relative to the segment content to
        // produce a time-travelling boundary.
        let offsets = [600.0, 0.0];
        let results = vec![
            chunk(0, vec![Segment::new(0.0, 10.0, "a")]),
            chunk(1, vec![Segment::new(0.0, 10.0, "b")]),
        ];

        let err = merge(&offsets, 1200.0, results).unwrap_err();
        assert!(matches!(err, MergeError::NonMonotonic { .. }));
    }

    #[test]
    fn merge_tolerates_provider_rounding_at_boundaries() {
        let offsets = [0.0, 600.0];
        let results = vec![
            chunk(0, vec![Segment::new(590.0, 600.3, "tail")]),
            chunk(1, vec![Segment::new(0.0, 5.0, "head")]),
        ];

        // 600.3 end vs 600.0 next start is within EPSILON.
        let transcript = merge(&offsets, 1200.0, results).unwrap();
        assert_eq!(transcript.segments.len(), 2);
    }

    #[test]
    fn merge_of_empty_plan_is_empty_transcript() {
        let transcript = merge(&[], 0.0, vec![]).unwrap();
        assert!(transcript.is_empty());
        assert_eq!(transcript.text, "");
    }

    #[test]
    fn merged_text_skips_blank_segments() {
        let offsets = [0.0];
        let results = vec![chunk(
            0,
            vec![
                Segment::new(0.0, 1.0, "  hello "),
                Segment::new(1.0, 2.0, "   "),
                Segment::new(2.0, 3.0, "world"),
            ],
        )];

        let transcript = merge(&offsets, 3.0, results).unwrap();
        assert_eq!(transcript.text, "hello world");
    }

    #[quickcheck_macros::quickcheck]
    fn prop_merged_segment_count_is_sum(per_chunk: Vec<u8>) -> bool {
        let per_chunk: Vec<usize> = per_chunk.into_iter().map(|n| (n % 5) as usize).collect();
        let window = 100.0;
        let offsets: Vec<f64> = (0..per_chunk.len()).map(|i| i as f64 * window).collect();

        let results: Vec<ChunkResult> = per_chunk
            .iter()
            .enumerate()
            .map(|(index, &count)| {
                let segments = (0..count)
                    .map(|j| {
                        let start = j as f64 * (window / 5.0);
                        Segment::new(start, start + 1.0, "w")
                    })
                    .collect();
                chunk(index, segments)
            })
            .collect();

        let expected: usize = per_chunk.iter().sum();
        let duration = offsets.len() as f64 * window;
        match merge(&offsets, duration, results) {
            Ok(t) => t.segments.len() == expected,
            Err(_) => false,
        }
    }
}
