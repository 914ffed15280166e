use std::collections::HashSet;

use crate::perception::ScreenSize;

use super::element::{DetectionMethod, ElementLocation, ElementMatch};

/// Matches whose box origins are closer than this are the same element.
pub const GROUPING_DISTANCE_PX: f64 = 50.0;
/// Score bonus per distinct detection method agreeing within a group.
pub const METHOD_AGREEMENT_BONUS: f64 = 0.1;

/// Candidates believed to be one physical element.
#[derive(Debug, Clone)]
pub struct MatchGroup {
    pub members: Vec<ElementMatch>,
}

impl MatchGroup {
    fn anchor(&self) -> &ElementMatch {
        &self.members[0]
    }

    pub fn distinct_methods(&self) -> usize {
        self.members
            .iter()
            .map(|m| m.method)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn average_confidence(&self) -> f64 {
        let total: f64 = self.members.iter().map(|m| m.confidence).sum();
        total / self.members.len() as f64
    }

    /// Average confidence, boosted when several methods agree.
    pub fn score(&self) -> f64 {
        self.average_confidence() * (1.0 + METHOD_AGREEMENT_BONUS * self.distinct_methods() as f64)
    }

    fn best_member(&self) -> &ElementMatch {
        self.members
            .iter()
            .fold(self.anchor(), |best, m| if m.confidence > best.confidence { m } else { best })
    }
}

/// Groups candidates by proximity to each group's first member.
pub fn group_matches(matches: Vec<ElementMatch>) -> Vec<MatchGroup> {
    let mut groups: Vec<MatchGroup> = Vec::new();

    for candidate in matches {
        let origin = candidate.bounding_box.origin();
        let existing = groups.iter_mut().find(|group| {
            group.anchor().bounding_box.origin().distance_to(origin) < GROUPING_DISTANCE_PX
        });

        match existing {
            Some(group) => group.members.push(candidate),
            None => groups.push(MatchGroup {
                members: vec![candidate],
            }),
        }
    }

    groups
}

/// Fuses every detector's candidates into the single most credible location.
pub fn integrate_matches(matches: Vec<ElementMatch>, screen_size: ScreenSize) -> Option<ElementLocation> {
    let groups = group_matches(matches);

    let best_group = groups.iter().fold(None::<&MatchGroup>, |best, group| match best {
        Some(current) if current.score() >= group.score() => Some(current),
        _ => Some(group),
    })?;

    let best = best_group.best_member();
    let method = if best_group.members.len() > 1 {
        DetectionMethod::Combined
    } else {
        best.method
    };

    Some(ElementLocation::new(
        best.bounding_box,
        best.confidence,
        method,
        screen_size,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::BoundingBox;

    fn candidate(x: i32, y: i32, confidence: f64, method: DetectionMethod) -> ElementMatch {
        ElementMatch::new("Sign In", BoundingBox::new(x, y, 80, 40).unwrap(), confidence, method)
    }

    fn screen() -> ScreenSize {
        ScreenSize::new(1080, 1920).unwrap()
    }

    #[test]
    fn no_candidates_yields_none() {
        assert!(integrate_matches(Vec::new(), screen()).is_none());
    }

    #[test]
    fn single_candidate_keeps_its_method() {
        let location = integrate_matches(vec![candidate(10, 10, 0.85, DetectionMethod::Text)], screen())
            .unwrap();
        assert_eq!(location.detection_method, DetectionMethod::Text);
        assert!((location.confidence - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn agreeing_methods_outscore_a_lone_stronger_match() {
        // lone: 0.9 * 1.1 = 0.99, pair: 0.84 * 1.2 = 1.008
        let matches = vec![
            candidate(500, 500, 0.9, DetectionMethod::Pattern),
            candidate(100, 100, 0.85, DetectionMethod::Text),
            candidate(120, 110, 0.83, DetectionMethod::Pattern),
        ];

        let location = integrate_matches(matches, screen()).unwrap();
        assert_eq!(location.detection_method, DetectionMethod::Combined);
        assert_eq!(location.bounding_box.origin().x, 100);
        assert!((location.confidence - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn same_method_group_is_still_labelled_combined() {
        let matches = vec![
            candidate(0, 0, 0.75, DetectionMethod::Text),
            candidate(10, 0, 0.85, DetectionMethod::Text),
        ];
        let location = integrate_matches(matches, screen()).unwrap();
        assert_eq!(location.detection_method, DetectionMethod::Combined);
        assert_eq!(location.bounding_box.x, 10);
    }

    #[test]
    fn grouping_threshold_is_exclusive_at_fifty_pixels() {
        let groups = group_matches(vec![
            candidate(0, 0, 0.8, DetectionMethod::Text),
            candidate(30, 40, 0.8, DetectionMethod::Pattern),
        ]);
        assert_eq!(groups.len(), 2);

        let groups = group_matches(vec![
            candidate(0, 0, 0.8, DetectionMethod::Text),
            candidate(30, 39, 0.8, DetectionMethod::Pattern),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].distinct_methods(), 2);
    }
}
