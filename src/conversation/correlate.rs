//! Positional pairing of parsed lines with evidence

use super::{EvidenceRecord, ParsedLine, Utterance};

/// Zip `lines[i]` with `evidence[i]`.
///
/// Missing positions get no evidence and surplus evidence is ignored. Pairing
/// never looks at content or speaker.
pub fn correlate(
    lines: Vec<ParsedLine>,
    evidence: Option<Vec<Option<EvidenceRecord>>>,
) -> Vec<Utterance> {
    let mut evidence = evidence.unwrap_or_default().into_iter();

    lines
        .into_iter()
        .map(|line| {
            Utterance::new(line.speaker, line.text).with_evidence(evidence.next().flatten())
        })
        .collect()
}
