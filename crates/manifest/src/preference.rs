//! Generic priority search over tagged candidates
//!
//! Given an ordered list of preference keys and a set of candidates
//! that each carry a tag, the first key any candidate matches wins.
//! The same shape serves file-variant selection and any other
//! most-specific-match lookup.

/// First candidate matching the highest-priority key, if any
pub fn first_match<'a, T>(
    preferences: &[String],
    candidates: &'a [T],
    tag: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    preferences
        .iter()
        .find_map(|key| candidates.iter().find(|candidate| tag(candidate) == key))
}

/// All candidates sharing the single best-matching key; levels are
/// never mixed. Empty when no key matches.
pub fn best_group<'a, T>(
    preferences: &[String],
    candidates: &'a [T],
    tag: impl Fn(&T) -> &str,
) -> Vec<&'a T> {
    for key in preferences {
        let group: Vec<&T> = candidates
            .iter()
            .filter(|candidate| tag(candidate) == key)
            .collect();
        if !group.is_empty() {
            return group;
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| (*k).to_string()).collect()
    }

    #[test]
    fn first_match_honors_preference_order() {
        let candidates = [("b", 1), ("c", 2), ("a", 3)];
        let found = first_match(&prefs(&["a", "b", "c"]), &candidates, |c| c.0);
        assert_eq!(found, Some(&("a", 3)));
    }

    #[test]
    fn first_match_skips_absent_keys() {
        let candidates = [("c", 2)];
        let found = first_match(&prefs(&["a", "b", "c"]), &candidates, |c| c.0);
        assert_eq!(found, Some(&("c", 2)));
        assert_eq!(
            first_match(&prefs(&["a", "b"]), &candidates, |c| c.0),
            None
        );
    }

    #[test]
    fn best_group_returns_every_candidate_at_one_level() {
        let candidates = [("b", 1), ("a", 2), ("b", 3), ("c", 4)];
        let group = best_group(&prefs(&["missing", "b", "a"]), &candidates, |c| c.0);
        assert_eq!(group, [&("b", 1), &("b", 3)]);
    }
}
