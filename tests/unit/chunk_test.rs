//! Unit tests for transcript chunking

use callscope::analyzer::chunk::reconstruct;
use callscope::analyzer::{ChunkCalculator, ChunkingError, TokenEstimator};

use crate::helpers::three_segment_transcript;

fn calculator() -> ChunkCalculator {
    ChunkCalculator::new(TokenEstimator::default())
}

fn sample_texts() -> Vec<String> {
    vec![
        three_segment_transcript(),
        "AE: Thanks for joining.\nCustomer: Happy to be here.\n".repeat(40),
        "Überprüfung der Lösung für São Paulo, 東京 office joins next week. ".repeat(30),
        "x".repeat(3_000),
        "word ".repeat(900),
    ]
}

// ============================================
// Reconstruction
// ============================================

#[test]
fn chunks_reconstruct_original_text() {
    let calc = calculator();
    for text in sample_texts() {
        for (max_tokens, overlap) in [(50, 0), (120, 50), (300, 120), (1_000, 10)] {
            let chunks = calc.chunk(&text, max_tokens, overlap).unwrap();
            assert_eq!(
                reconstruct(&chunks),
                text,
                "max_tokens={} overlap={}",
                max_tokens,
                overlap
            );
        }
    }
}

#[test]
fn chunks_respect_token_budget() {
    let calc = calculator();
    for text in sample_texts() {
        let chunks = calc.chunk(&text, 120, 50).unwrap();
        for chunk in &chunks {
            assert!(chunk.estimated_tokens <= 120, "chunk too large: {:?}", chunk);
        }
    }
}

#[test]
fn chunk_offsets_are_char_boundaries() {
    let calc = calculator();
    let text = "Überprüfung der Lösung, 東京 ".repeat(50);
    let chunks = calc.chunk(&text, 40, 15).unwrap();
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(text.is_char_boundary(chunk.start_offset));
        assert!(text.is_char_boundary(chunk.end_offset));
        assert_eq!(&text[chunk.start_offset..chunk.end_offset], chunk.text);
    }
}

// ============================================
// Shape
// ============================================

#[test]
fn small_text_is_single_chunk() {
    let text = "A short intro call.";
    let chunks = calculator().chunk(text, 1_000, 100).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
    assert!(chunks[0].is_final);
}

#[test]
fn empty_text_has_no_chunks() {
    assert!(calculator().chunk("", 100, 10).unwrap().is_empty());
}

#[test]
fn three_paragraphs_make_three_segments() {
    let text = three_segment_transcript();
    let chunks = calculator().chunk(&text, 120, 50).unwrap();
    assert_eq!(chunks.len(), 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.sequence_index, i);
        assert_eq!(chunk.is_final, i == 2);
        if i > 0 {
            assert_eq!(chunk.overlap_with(&chunks[i - 1]), 50);
        }
    }
}

#[test]
fn chunk_starts_strictly_increase() {
    let text = "x".repeat(2_000);
    let chunks = calculator().chunk(&text, 100, 399).unwrap();
    for pair in chunks.windows(2) {
        assert!(pair[1].start_offset > pair[0].start_offset);
    }
}

// ============================================
// Errors
// ============================================

#[test]
fn zero_budget_is_rejected() {
    let err = calculator().chunk("text", 0, 0).unwrap_err();
    assert!(matches!(err, ChunkingError::ZeroTokenBudget));
}

#[test]
fn overlap_must_be_below_char_budget() {
    let err = calculator().chunk("text", 100, 400).unwrap_err();
    assert!(matches!(err, ChunkingError::OverlapTooLarge { .. }));
}
