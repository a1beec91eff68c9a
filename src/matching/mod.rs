//! Fuzzy catalog name matching.
//!
//! A single pure matching function shared by the query analyzer (resolving
//! entity names mentioned in a question) and the offline duplicate finder.
//! Matching is case- and diacritic-insensitive; a unique exact folded match
//! beats any fuzzy candidate, otherwise the best fuzzy candidate above the
//! similarity threshold is picked. Two candidates tied at the top — whether
//! by identical folded names or by equal fuzzy scores — are reported as
//! ambiguous rather than silently picking one.

mod levenshtein;

pub use levenshtein::{levenshtein_distance, similarity};

/// A catalog entry a name fragment can resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub name: String,
}

/// Outcome of matching one name fragment against a candidate list.
#[derive(Debug, Clone, PartialEq)]
pub enum NameMatch {
    /// Folded forms are identical.
    Exact { index: usize },
    /// Single best candidate at or above the threshold.
    Fuzzy { index: usize, score: f64 },
    /// Two distinct candidates share the top score above the threshold.
    Ambiguous {
        first: usize,
        second: usize,
        score: f64,
    },
    NoMatch,
}

/// Lowercase a name and strip the diacritics that show up in real catalog
/// data (Beyoncé, Sigur Rós, Motörhead). Whitespace runs collapse to a
/// single space.
pub fn fold_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    let mut last_was_space = true;
    for c in name.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                folded.push(' ');
                last_was_space = true;
            }
            continue;
        }
        last_was_space = false;
        for lower in c.to_lowercase() {
            folded.push(strip_diacritic(lower));
        }
    }
    while folded.ends_with(' ') {
        folded.pop();
    }
    folded
}

fn strip_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ß' => 's',
        other => other,
    }
}

/// Match a name fragment against candidates.
///
/// The scan is exhaustive: every candidate is scored so that ties can be
/// detected. Scores compare on folded forms.
pub fn best_match(fragment: &str, candidates: &[Candidate], threshold: f64) -> NameMatch {
    let folded_fragment = fold_name(fragment);
    if folded_fragment.is_empty() || candidates.is_empty() {
        return NameMatch::NoMatch;
    }

    let mut exact: Option<usize> = None;
    let mut best: Option<(usize, f64)> = None;
    let mut runner_up: Option<(usize, f64)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let folded_candidate = fold_name(&candidate.name);
        if folded_candidate == folded_fragment {
            match exact {
                // Two rows folding to the same name are themselves a tie
                Some(first) => {
                    return NameMatch::Ambiguous {
                        first,
                        second: index,
                        score: 1.0,
                    };
                }
                None => exact = Some(index),
            }
            continue;
        }

        let score = similarity(&folded_fragment, &folded_candidate);
        match best {
            None => best = Some((index, score)),
            Some((_, best_score)) if score > best_score => {
                runner_up = best;
                best = Some((index, score));
            }
            Some((_, best_score)) => {
                if runner_up.map_or(true, |(_, s)| score > s) && score <= best_score {
                    runner_up = Some((index, score));
                }
            }
        }
    }

    if let Some(index) = exact {
        return NameMatch::Exact { index };
    }

    match (best, runner_up) {
        (Some((index, score)), Some((second, second_score)))
            if score >= threshold && ties(score, second_score) =>
        {
            NameMatch::Ambiguous {
                first: index,
                second,
                score,
            }
        }
        (Some((index, score)), _) if score >= threshold => NameMatch::Fuzzy { index, score },
        _ => NameMatch::NoMatch,
    }
}

fn ties(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Find pairs of candidates whose folded names score at or above the
/// threshold. Used by the offline duplicate finder; pairs come back ordered
/// by descending similarity.
pub fn duplicate_pairs(candidates: &[Candidate], threshold: f64) -> Vec<(usize, usize, f64)> {
    let folded: Vec<String> = candidates.iter().map(|c| fold_name(&c.name)).collect();
    let mut pairs = Vec::new();
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let score = similarity(&folded[i], &folded[j]);
            if score >= threshold {
                pairs.push((i, j, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Candidate {
                id: format!("id-{i}"),
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_fold_name() {
        assert_eq!(fold_name("Beyoncé"), "beyonce");
        assert_eq!(fold_name("Sigur Rós"), "sigur ros");
        assert_eq!(fold_name("  The   Beatles "), "the beatles");
        assert_eq!(fold_name("MOTÖRHEAD"), "motorhead");
    }

    #[test]
    fn test_exact_match_beats_fuzzy() {
        let list = candidates(&["Radiohead", "Radiohead Tribute Band"]);
        assert_eq!(
            best_match("radiohead", &list, 0.7),
            NameMatch::Exact { index: 0 }
        );
    }

    #[test]
    fn test_exact_match_ignores_case_and_diacritics() {
        let list = candidates(&["Beyoncé"]);
        assert_eq!(
            best_match("BEYONCE", &list, 0.7),
            NameMatch::Exact { index: 0 }
        );
    }

    #[test]
    fn test_fuzzy_match_above_threshold() {
        let list = candidates(&["Metallica", "Madonna"]);
        match best_match("metalica", &list, 0.7) {
            NameMatch::Fuzzy { index, score } => {
                assert_eq!(index, 0);
                assert!(score > 0.85);
            }
            other => panic!("expected fuzzy match, got {other:?}"),
        }
    }

    #[test]
    fn test_no_match_below_threshold() {
        let list = candidates(&["Metallica", "Madonna"]);
        assert_eq!(best_match("xqzvw", &list, 0.7), NameMatch::NoMatch);
    }

    #[test]
    fn test_tie_is_ambiguous() {
        // Equidistant from the fragment, both above threshold
        let list = candidates(&["Daft Punky", "Daft Punks"]);
        match best_match("Daft Punk", &list, 0.7) {
            NameMatch::Ambiguous { first, second, .. } => {
                assert_ne!(first, second);
            }
            other => panic!("expected ambiguous match, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_exact_names_are_ambiguous() {
        // Same name twice in the catalog, differing only in case
        let list = candidates(&["Daft Punk", "DAFT PUNK", "Madonna"]);
        match best_match("daft punk", &list, 0.7) {
            NameMatch::Ambiguous {
                first,
                second,
                score,
            } => {
                assert_eq!((first, second), (0, 1));
                assert_eq!(score, 1.0);
            }
            other => panic!("expected ambiguous match, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_fragment_never_matches() {
        let list = candidates(&["Metallica"]);
        assert_eq!(best_match("   ", &list, 0.7), NameMatch::NoMatch);
    }

    #[test]
    fn test_duplicate_pairs_ordering() {
        let list = candidates(&["Nirvana", "Nirvanna", "Oasis"]);
        let pairs = duplicate_pairs(&list, 0.8);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].0, pairs[0].1), (0, 1));
    }
}
