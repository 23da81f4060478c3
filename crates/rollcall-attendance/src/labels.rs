//! Pairing gallery matches with detected face boxes.

use crate::roster::display_name;
use rollcall_core::{BoundingBox, IdentityMatch};
use rollcall_imaging::FaceLabel;

/// Minimum overlap for a match's source face to claim a detected box.
const PAIRING_MIN_IOU: f32 = 0.5;

/// Label every detected face.
///
/// When every match carries the face it was computed from, each match claims
/// the unclaimed detected box it overlaps most. Otherwise the i-th box gets the
/// i-th match. Boxes left over are `Unknown`.
pub fn pair_labels(faces: &[BoundingBox], matches: &[IdentityMatch]) -> Vec<FaceLabel> {
    if !matches.is_empty() && matches.iter().all(|m| m.face.is_some()) {
        pair_by_overlap(faces, matches)
    } else {
        pair_by_index(faces, matches)
    }
}

fn pair_by_index(faces: &[BoundingBox], matches: &[IdentityMatch]) -> Vec<FaceLabel> {
    (0..faces.len())
        .map(|i| match matches.get(i) {
            Some(m) => FaceLabel::Known(display_name(&m.identity)),
            None => FaceLabel::Unknown,
        })
        .collect()
}

fn pair_by_overlap(faces: &[BoundingBox], matches: &[IdentityMatch]) -> Vec<FaceLabel> {
    let mut labels = vec![FaceLabel::Unknown; faces.len()];
    let mut claimed = vec![false; faces.len()];

    for m in matches {
        let Some(source) = &m.face else { continue };

        let best = faces
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .map(|(i, f)| (i, f.iou(source)))
            .filter(|(_, iou)| *iou >= PAIRING_MIN_IOU)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((i, _)) => {
                claimed[i] = true;
                labels[i] = FaceLabel::Known(display_name(&m.identity));
            }
            None => tracing::debug!(identity = %m.identity, "match has no overlapping detected face"),
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32) -> BoundingBox {
        BoundingBox { x, y, width: 50.0, height: 50.0, confidence: 0.9, landmarks: None }
    }

    fn matched(identity: &str, source: Option<BoundingBox>) -> IdentityMatch {
        IdentityMatch { identity: identity.into(), similarity: 0.8, face: source }
    }

    fn known(name: &str) -> FaceLabel {
        FaceLabel::Known(name.into())
    }

    #[test]
    fn test_index_pairing_without_locality() {
        let faces = [face(0.0, 0.0), face(100.0, 0.0)];
        let matches = [matched("/g/alice/alice1.jpg", None)];
        assert_eq!(pair_labels(&faces, &matches), vec![known("alice1.jpg"), FaceLabel::Unknown]);
    }

    #[test]
    fn test_overlap_pairing_follows_the_face() {
        // The match belongs to the second detected face, not the first.
        let faces = [face(0.0, 0.0), face(100.0, 0.0)];
        let matches = [matched("/g/bob/bob1.jpg", Some(face(102.0, 1.0)))];
        assert_eq!(pair_labels(&faces, &matches), vec![FaceLabel::Unknown, known("bob1.jpg")]);
    }

    #[test]
    fn test_overlap_pairing_each_box_claimed_once() {
        let faces = [face(0.0, 0.0)];
        let matches = [
            matched("/g/alice/alice1.jpg", Some(face(0.0, 0.0))),
            matched("/g/bob/bob1.jpg", Some(face(1.0, 1.0))),
        ];
        assert_eq!(pair_labels(&faces, &matches), vec![known("alice1.jpg")]);
    }

    #[test]
    fn test_overlap_pairing_ignores_distant_match() {
        let faces = [face(0.0, 0.0)];
        let matches = [matched("/g/alice/alice1.jpg", Some(face(300.0, 300.0)))];
        assert_eq!(pair_labels(&faces, &matches), vec![FaceLabel::Unknown]);
    }

    #[test]
    fn test_no_faces_no_labels() {
        let matches = [matched("/g/alice/alice1.jpg", None)];
        assert!(pair_labels(&[], &matches).is_empty());
    }
}
