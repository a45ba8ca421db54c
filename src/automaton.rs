//! Bounded Levenshtein automaton.
//!
//! Keeps only the sparse frontier of the edit-distance table: the columns of
//! the pattern still reachable within the edit budget, with their costs. At
//! most `2n + 1` columns survive a step, so matching a target of length `m`
//! costs `O(m * n)` instead of `O(m * len(pattern))`.

use std::collections::BTreeSet;

/// Sparse DP frontier. `indices` is strictly increasing and each
/// `values[j] <= max_edits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomatonState {
    indices: Vec<usize>,
    values: Vec<usize>,
}

impl AutomatonState {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[usize] {
        &self.values
    }
}

#[derive(Debug, Clone)]
pub struct LevenshteinAutomaton {
    pattern: Vec<char>,
    max_edits: usize,
}

impl LevenshteinAutomaton {
    pub fn new(pattern: &str, max_edits: usize) -> Self {
        Self {
            pattern: pattern.chars().collect(),
            max_edits,
        }
    }

    pub fn max_edits(&self) -> usize {
        self.max_edits
    }

    /// Row zero: deleting the first `k` pattern characters costs `k`.
    pub fn start(&self) -> AutomatonState {
        let reach = self.max_edits.min(self.pattern.len());
        AutomatonState {
            indices: (0..=reach).collect(),
            values: (0..=reach).collect(),
        }
    }

    pub fn step(&self, state: &AutomatonState, c: char) -> AutomatonState {
        let AutomatonState { indices, values } = state;
        let mut new_indices = Vec::with_capacity(indices.len() + 1);
        let mut new_values = Vec::with_capacity(indices.len() + 1);

        // Column 0 restarts as long as the budget allows another insertion.
        if indices.first() == Some(&0) && values[0] < self.max_edits {
            new_indices.push(0);
            new_values.push(values[0] + 1);
        }

        for (j, &i) in indices.iter().enumerate() {
            if i == self.pattern.len() {
                break;
            }
            let cost = usize::from(self.pattern[i] != c);
            let mut val = values[j] + cost;
            if new_indices.last() == Some(&i) {
                if let Some(&left) = new_values.last() {
                    val = val.min(left + 1);
                }
            }
            if j + 1 < indices.len() && indices[j + 1] == i + 1 {
                val = val.min(values[j + 1] + 1);
            }
            if val <= self.max_edits {
                new_indices.push(i + 1);
                new_values.push(val);
            }
        }

        AutomatonState {
            indices: new_indices,
            values: new_values,
        }
    }

    pub fn is_match(&self, state: &AutomatonState) -> bool {
        state.indices.last() == Some(&self.pattern.len())
    }

    pub fn can_match(&self, state: &AutomatonState) -> bool {
        !state.indices.is_empty()
    }

    /// Pattern characters that can extend the current frontier.
    pub fn transitions(&self, state: &AutomatonState) -> BTreeSet<char> {
        state
            .indices
            .iter()
            .filter_map(|&i| self.pattern.get(i).copied())
            .collect()
    }

    /// Edit distance of the full pattern; `None` unless `is_match` holds.
    pub fn distance(&self, state: &AutomatonState) -> Option<usize> {
        if self.is_match(state) {
            state.values.last().copied()
        } else {
            None
        }
    }
}

/// Levenshtein distance between `s1` and `s2` if it is at most `max_distance`.
pub fn bounded_distance(s1: &str, s2: &str, max_distance: usize) -> Option<usize> {
    let automaton = LevenshteinAutomaton::new(s1, max_distance);
    let mut state = automaton.start();
    for c in s2.chars() {
        state = automaton.step(&state, c);
        if !automaton.can_match(&state) {
            return None;
        }
    }
    automaton.distance(&state)
}
