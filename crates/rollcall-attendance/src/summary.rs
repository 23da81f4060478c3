use serde::Serialize;

/// Face counts accumulated across one batch.
///
/// `recognized() + unknown_faces == total_faces` holds after every recorded image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_faces: usize,
    pub unknown_faces: usize,
    /// Surplus gallery matches beyond the number of detected faces, summed over images.
    pub anomalies: usize,
}

impl RunSummary {
    /// Add one image's counts. Returns the surplus of matches over faces (0 when consistent).
    pub fn record_image(&mut self, detected: usize, matched: usize) -> usize {
        let surplus = matched.saturating_sub(detected);
        self.total_faces += detected;
        self.unknown_faces += detected.saturating_sub(matched);
        self.anomalies += surplus;
        surplus
    }

    pub fn recognized(&self) -> usize {
        self.total_faces - self.unknown_faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_more_faces_than_matches() {
        let mut s = RunSummary::default();
        assert_eq!(s.record_image(2, 1), 0);
        assert_eq!((s.total_faces, s.recognized(), s.unknown_faces), (2, 1, 1));
    }

    #[test]
    fn test_zero_faces_contributes_nothing() {
        let mut s = RunSummary::default();
        s.record_image(0, 0);
        assert_eq!(s, RunSummary::default());
    }

    #[test]
    fn test_surplus_matches_clamped_and_counted() {
        let mut s = RunSummary::default();
        assert_eq!(s.record_image(1, 3), 2);
        assert_eq!(s.unknown_faces, 0);
        assert_eq!(s.recognized(), 1);
        assert_eq!(s.anomalies, 2);
    }

    #[test]
    fn test_invariant_holds_across_images() {
        let mut s = RunSummary::default();
        for (detected, matched) in [(3, 1), (0, 0), (2, 4), (5, 5), (1, 0)] {
            s.record_image(detected, matched);
            assert_eq!(s.recognized() + s.unknown_faces, s.total_faces);
        }
        assert_eq!(s.total_faces, 11);
        assert_eq!(s.unknown_faces, 3);
    }
}
