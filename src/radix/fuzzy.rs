//! Bounded Levenshtein-distance lookup over a [`super::node::Node`] tree.
//!
//! A single DP matrix is allocated once per call and reused across the
//! whole traversal: each row corresponds to one more byte consumed along
//! some root-to-node path (bounded to `len(query) + 1 + max_distance`
//! rows, since going deeper than that can never land within
//! `max_distance` of the query), and each column corresponds to one
//! position in the query (`len(query) + 1` columns). Descending an edge
//! fills one row per byte from the previous row; backtracking to a
//! sibling just overwrites the same rows again, since a row's contents
//! depend only on the bytes consumed so far, not on which branch
//! produced them.
//!
//! Distance is computed over bytes rather than `char`s: tree edges split
//! wherever two inserted keys first differ, which for UTF-8 text is
//! usually but not always a character boundary (two distinct letters can
//! share a leading byte). Treating each byte as an edit unit keeps the
//! traversal simple and is exact for single-byte (ASCII) terms; for
//! multi-byte scripts it can count one character as more than one edit,
//! a documented approximation (see DESIGN.md).

use super::node::Node;

/// One fuzzy hit: the matched key, its value, and the edit distance.
pub struct FuzzyMatch<'a, V> {
    pub key: String,
    pub value: &'a V,
    pub distance: usize,
}

pub(super) fn fuzzy_search<'a, V>(
    root: &'a Node<V>,
    query: &str,
    max_distance: usize,
) -> Vec<FuzzyMatch<'a, V>> {
    let query = query.as_bytes();
    let cols = query.len() + 1;
    let rows = query.len() + 1 + max_distance;
    let mut matrix = vec![vec![(max_distance + 1) as i32; cols]; rows];
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j as i32;
    }
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i as i32;
    }

    let mut out = Vec::new();
    let mut key_bytes = Vec::new();
    walk(root, query, max_distance, &mut matrix, 0, &mut key_bytes, &mut out);
    out
}

#[allow(clippy::too_many_arguments)]
fn walk<'a, V>(
    node: &'a Node<V>,
    query: &[u8],
    max_distance: usize,
    matrix: &mut Vec<Vec<i32>>,
    depth: usize,
    key_bytes: &mut Vec<u8>,
    out: &mut Vec<FuzzyMatch<'a, V>>,
) {
    for child in node.children.values() {
        let mut cur_depth = depth;
        let mut pruned = false;

        for &byte in &child.label {
            cur_depth += 1;
            key_bytes.push(byte);

            if cur_depth >= matrix.len() {
                pruned = true;
                break;
            }

            let cols = matrix[0].len();
            {
                let (prev_rows, cur_rows) = matrix.split_at_mut(cur_depth);
                let prev = &prev_rows[cur_depth - 1];
                let cur = &mut cur_rows[0];
                cur[0] = cur_depth as i32;
                for j in 1..cols {
                    let sub_cost = if query[j - 1] == byte { 0 } else { 1 };
                    let substitute = prev[j - 1] + sub_cost;
                    let delete = prev[j] + 1;
                    let insert = cur[j - 1] + 1;
                    cur[j] = substitute.min(delete).min(insert);
                }
            }

            let row = &matrix[cur_depth];
            let lo = cur_depth.saturating_sub(max_distance + 1);
            let hi = (cur_depth + max_distance).min(row.len() - 1);
            let row_min = row[lo..=hi].iter().copied().min().unwrap_or(i32::MAX);
            if row_min as usize > max_distance {
                pruned = true;
                break;
            }
        }

        if !pruned {
            if let Some(value) = &child.value {
                let distance = matrix[cur_depth][matrix[0].len() - 1];
                if distance as usize <= max_distance {
                    out.push(FuzzyMatch {
                        key: String::from_utf8_lossy(key_bytes).into_owned(),
                        value,
                        distance: distance as usize,
                    });
                }
            }
            walk(child, query, max_distance, matrix, cur_depth, key_bytes, out);
        }

        key_bytes.truncate(depth);
    }
}
