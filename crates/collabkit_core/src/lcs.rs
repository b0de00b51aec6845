//! Longest common subsequence of two value sequences.
//!
//! The search runs over `(a_idx, b_idx)` states. From each state three moves
//! are possible: consume both elements when they match, or skip one element
//! of either side. States whose best reachable length still meets the current
//! target are expanded right away; the rest wait for a later round, when the
//! target has dropped by one. The first round in which the terminal state
//! `(a.len(), b.len())` becomes reachable ends the search.

use std::collections::HashMap;

use crate::hash::HashMemo;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct State {
    a_idx: usize,
    b_idx: usize,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    length: usize,
    predecessor: Option<State>,
}

struct Frontier {
    a_len: usize,
    b_len: usize,
    cells: HashMap<usize, Cell>,
    current: Vec<State>,
    next: Vec<State>,
    target: usize,
}

impl Frontier {
    fn new(a_len: usize, b_len: usize) -> Self {
        let mut cells = HashMap::new();
        cells.insert(
            0,
            Cell {
                length: 0,
                predecessor: None,
            },
        );
        Self {
            a_len,
            b_len,
            cells,
            current: vec![State { a_idx: 0, b_idx: 0 }],
            next: Vec::new(),
            target: a_len.min(b_len),
        }
    }

    fn key(&self, state: State) -> usize {
        state.a_idx * (self.b_len + 1) + state.b_idx
    }

    fn length(&self, state: State) -> usize {
        self.cells.get(&self.key(state)).map_or(0, |cell| cell.length)
    }

    fn is_done(&self) -> bool {
        self.cells.contains_key(&self.key(State {
            a_idx: self.a_len,
            b_idx: self.b_len,
        }))
    }

    /// Record `length` for `state` if it improves on what is known, and queue
    /// the state in the round it can still contribute to.
    fn relax(&mut self, from: State, state: State, length: usize) {
        let key = self.key(state);
        if self.cells.get(&key).is_some_and(|cell| cell.length >= length) {
            return;
        }
        self.cells.insert(
            key,
            Cell {
                length,
                predecessor: Some(from),
            },
        );
        let remaining = (self.a_len - state.a_idx).min(self.b_len - state.b_idx);
        if length + remaining >= self.target {
            self.current.push(state);
        } else {
            self.next.push(state);
        }
    }
}

/// Compute a longest common subsequence of `a` and `b`.
///
/// Elements are compared with [`HashMemo::matches`]. The returned references
/// point into `a`.
pub fn longest_common_subsequence<'a>(
    a: &'a [Value],
    b: &'a [Value],
    memo: &mut HashMemo<'a>,
) -> Vec<&'a Value> {
    let mut frontier = Frontier::new(a.len(), b.len());
    let mut rounds = 0usize;

    while !frontier.is_done() {
        if frontier.current.is_empty() && frontier.next.is_empty() {
            break;
        }
        // `current` grows while it is walked; newly queued states belong to
        // this round too.
        let mut cursor = 0;
        while cursor < frontier.current.len() {
            let state = frontier.current[cursor];
            cursor += 1;
            let length = frontier.length(state);
            let State { a_idx, b_idx } = state;

            if a_idx < a.len() && b_idx < b.len() && memo.matches(&a[a_idx], &b[b_idx]) {
                frontier.relax(
                    state,
                    State {
                        a_idx: a_idx + 1,
                        b_idx: b_idx + 1,
                    },
                    length + 1,
                );
            }
            if a_idx < a.len() {
                frontier.relax(
                    state,
                    State {
                        a_idx: a_idx + 1,
                        b_idx,
                    },
                    length,
                );
            }
            if b_idx < b.len() {
                frontier.relax(
                    state,
                    State {
                        a_idx,
                        b_idx: b_idx + 1,
                    },
                    length,
                );
            }
        }
        frontier.current = std::mem::take(&mut frontier.next);
        frontier.target = frontier.target.saturating_sub(1);
        rounds += 1;
    }

    log::trace!(
        "lcs: {}x{} settled after {} rounds over {} states",
        a.len(),
        b.len(),
        rounds,
        frontier.cells.len()
    );

    let mut subsequence = Vec::new();
    let mut state = State {
        a_idx: a.len(),
        b_idx: b.len(),
    };
    while let Some(previous) = frontier
        .cells
        .get(&frontier.key(state))
        .and_then(|cell| cell.predecessor)
    {
        if previous.a_idx != state.a_idx && previous.b_idx != state.b_idx {
            subsequence.push(&a[previous.a_idx]);
        }
        state = previous;
    }
    subsequence.reverse();
    subsequence
}
