//! Ordinal navigation over a uniquely-numbered sibling set (episodes of a
//! story, versions of an episode).

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub has_next: bool,
    pub has_previous: bool,
    pub next_id: Option<Uuid>,
    pub previous_id: Option<Uuid>,
}

/// Strictly-greater / strictly-lesser adjacency. Duplicate ordinals cannot
/// occur: both sibling sets carry unique constraints on the ordinal column.
pub fn navigate(siblings: &[(i32, Uuid)], current: i32) -> Navigation {
    let next = siblings
        .iter()
        .filter(|(n, _)| *n > current)
        .min_by_key(|(n, _)| *n);
    let previous = siblings
        .iter()
        .filter(|(n, _)| *n < current)
        .max_by_key(|(n, _)| *n);

    Navigation {
        has_next: next.is_some(),
        has_previous: previous.is_some(),
        next_id: next.map(|(_, id)| *id),
        previous_id: previous.map(|(_, id)| *id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn siblings(ordinals: &[i32]) -> Vec<(i32, Uuid)> {
        ordinals.iter().map(|n| (*n, Uuid::new_v4())).collect()
    }

    #[test]
    fn middle_element_has_both_neighbors() {
        let s = siblings(&[1, 2, 3]);
        let nav = navigate(&s, 2);
        assert!(nav.has_next);
        assert!(nav.has_previous);
        assert_eq!(nav.next_id, Some(s[2].1));
        assert_eq!(nav.previous_id, Some(s[0].1));
    }

    #[test]
    fn first_element_has_no_previous() {
        let s = siblings(&[1, 2, 3]);
        let nav = navigate(&s, 1);
        assert!(!nav.has_previous);
        assert_eq!(nav.previous_id, None);
        assert_eq!(nav.next_id, Some(s[1].1));
    }

    #[test]
    fn last_element_has_no_next() {
        let s = siblings(&[1, 2, 3]);
        let nav = navigate(&s, 3);
        assert!(!nav.has_next);
        assert_eq!(nav.next_id, None);
    }

    #[test]
    fn gaps_in_numbering_are_legal() {
        // Caller-chosen episode numbers may leave gaps.
        let s = siblings(&[1, 5, 9]);
        let nav = navigate(&s, 5);
        assert_eq!(nav.next_id, Some(s[2].1));
        assert_eq!(nav.previous_id, Some(s[0].1));
    }

    #[test]
    fn unordered_input_still_navigates() {
        let s = vec![
            (3, Uuid::new_v4()),
            (1, Uuid::new_v4()),
            (2, Uuid::new_v4()),
        ];
        let nav = navigate(&s, 2);
        assert_eq!(nav.next_id, Some(s[0].1));
        assert_eq!(nav.previous_id, Some(s[1].1));
    }

    #[test]
    fn singleton_has_no_neighbors() {
        let s = siblings(&[1]);
        let nav = navigate(&s, 1);
        assert!(!nav.has_next && !nav.has_previous);
    }
}
