// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Two-column grouping for chart and card grids.

/// Group consecutive items into rows of two; an odd trailing item gets a
/// row of its own. Absent input yields no rows.
///
/// ```
/// use sitebuild::layout::pair_up;
///
/// let rows = pair_up(Some(&["A", "B", "C", "D", "E"][..]));
/// assert_eq!(rows, vec![vec!["A", "B"], vec!["C", "D"], vec!["E"]]);
/// assert!(pair_up::<&str>(None).is_empty());
/// ```
pub fn pair_up<T: Clone>(items: Option<&[T]>) -> Vec<Vec<T>> {
    items
        .unwrap_or_default()
        .chunks(2)
        .map(<[T]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_up_group_sizes() {
        for n in 0..9usize {
            let items: Vec<usize> = (0..n).collect();
            let rows = pair_up(Some(&items[..]));

            assert_eq!(rows.len(), n.div_ceil(2));
            for (i, row) in rows.iter().enumerate() {
                let last = i + 1 == rows.len();
                let expected = if last && n % 2 == 1 { 1 } else { 2 };
                assert_eq!(row.len(), expected, "n={n} row={i}");
            }
            assert_eq!(rows.concat(), items);
        }
    }

    #[test]
    fn test_pair_up_empty() {
        assert!(pair_up::<u8>(Some(&[])).is_empty());
        assert!(pair_up::<u8>(None).is_empty());
    }
}
