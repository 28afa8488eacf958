//! Detection-to-track association.

use ndarray::Array2;
use tracing::warn;

use crate::tracker::rect::{Rect, iou_batch};

/// Cost given to padding cells so the solver never prefers them.
const PAD_COST: f64 = 1e6;

/// Detection input for the tracker, in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box (x1, y1, x2, y2)
    pub bbox: Rect,
    /// Detection confidence score
    pub score: f32,
    /// Detector class label
    pub class_id: u32,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
            class_id: 0,
        }
    }

    pub fn from_rect(bbox: Rect, score: f32, class_id: u32) -> Self {
        Self {
            bbox,
            score,
            class_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    /// `(track_idx, det_idx)` pairs, ascending by track index
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Minimum-cost one-to-one assignment over a rectangular cost matrix.
///
/// Returns `(row, col)` pairs ascending by row. Rows or columns left over
/// from a non-square matrix are simply absent. Among assignments of equal
/// total cost, lower rows are matched first and take the lower columns.
pub fn linear_assignment(cost_matrix: &Array2<f32>) -> Vec<(usize, usize)> {
    let (num_rows, num_cols) = cost_matrix.dim();
    if num_rows == 0 || num_cols == 0 {
        return Vec::new();
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), PAD_COST);
    for ((i, j), &cost) in cost_matrix.indexed_iter() {
        padded[[i, j]] = cost as f64;
    }

    let mut row_to_col: Vec<Option<usize>> = match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => row_to_col
            .into_iter()
            .take(num_rows)
            .map(|col| (col < num_cols).then_some(col))
            .collect(),
        Err(err) => {
            warn!(?err, num_rows, num_cols, "assignment solver failed; nothing matched");
            return Vec::new();
        }
    };
    prefer_lower_indices(cost_matrix, &mut row_to_col);

    row_to_col
        .into_iter()
        .enumerate()
        .filter_map(|(row, col)| col.map(|col| (row, col)))
        .collect()
}

/// Rewrite an optimal assignment into the equal-cost one that favours low
/// indices: a free row takes over a higher row's column, a free column
/// replaces a higher one, and crossed pairs are uncrossed, each only when
/// the total cost stays exactly the same.
fn prefer_lower_indices(costs: &Array2<f32>, row_to_col: &mut [Option<usize>]) {
    let mut changed = true;
    while changed {
        changed = false;

        for a in 0..row_to_col.len() {
            if let Some(ca) = row_to_col[a] {
                let taken: Vec<usize> = row_to_col.iter().flatten().copied().collect();
                if let Some(free) =
                    (0..ca).find(|c| !taken.contains(c) && costs[[a, *c]] == costs[[a, ca]])
                {
                    row_to_col[a] = Some(free);
                    changed = true;
                }
            }

            for b in a + 1..row_to_col.len() {
                match (row_to_col[a], row_to_col[b]) {
                    (None, Some(cb)) if costs[[a, cb]] == costs[[b, cb]] => {
                        row_to_col[a] = Some(cb);
                        row_to_col[b] = None;
                        changed = true;
                    }
                    (Some(ca), Some(cb))
                        if cb < ca
                            && costs[[a, cb]] + costs[[b, ca]]
                                == costs[[a, ca]] + costs[[b, cb]] =>
                    {
                        row_to_col[a] = Some(cb);
                        row_to_col[b] = Some(ca);
                        changed = true;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Associate predicted track boxes with detections.
///
/// Pairs are chosen to minimise total `1 - IoU`; any chosen pair whose IoU
/// falls below `iou_threshold` is rejected and both sides reported as
/// unmatched.
pub fn associate(
    track_boxes: &[Rect],
    det_boxes: &[Rect],
    iou_threshold: f32,
) -> AssignmentResult {
    let ious = iou_batch(track_boxes, det_boxes);
    let costs = ious.mapv(|iou| 1.0 - iou);

    let mut track_matched = vec![false; track_boxes.len()];
    let mut det_matched = vec![false; det_boxes.len()];
    let mut matches = Vec::new();

    for (row, col) in linear_assignment(&costs) {
        if ious[[row, col]] >= iou_threshold {
            track_matched[row] = true;
            det_matched[col] = true;
            matches.push((row, col));
        }
    }

    AssignmentResult {
        matches,
        unmatched_tracks: unset_indices(&track_matched),
        unmatched_detections: unset_indices(&det_matched),
    }
}

fn unset_indices(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(i, &set)| if set { None } else { Some(i) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn rect(x1: f32, y1: f32, x2: f32, y2: f32) -> Rect {
        Rect::from_tlbr(x1, y1, x2, y2)
    }

    #[test]
    fn test_linear_assignment_square() {
        let costs = array![[0.9, 0.1], [0.2, 0.8]];
        assert_eq!(linear_assignment(&costs), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_linear_assignment_optimal_not_greedy() {
        // Greedy would take (0, 0) at 0.1 and pay 0.9 for (1, 1).
        let costs = array![[0.1, 0.2], [0.3, 1.0]];
        assert_eq!(linear_assignment(&costs), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_linear_assignment_rectangular() {
        let costs = array![[0.5], [0.1], [0.9]];
        assert_eq!(linear_assignment(&costs), vec![(1, 0)]);
    }

    #[test]
    fn test_associate_empty_sides() {
        let dets = [rect(0.0, 0.0, 10.0, 10.0), rect(20.0, 20.0, 30.0, 30.0)];
        let result = associate(&[], &dets, 0.5);
        assert!(result.matches.is_empty());
        assert!(result.unmatched_tracks.is_empty());
        assert_eq!(result.unmatched_detections, vec![0, 1]);

        let result = associate(&dets, &[], 0.5);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0, 1]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_associate_rejects_low_iou() {
        let tracks = [rect(0.0, 0.0, 10.0, 10.0)];
        let dets = [rect(5.0, 0.0, 15.0, 10.0)]; // IoU = 50 / 150
        let result = associate(&tracks, &dets, 0.5);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0]);
        assert_eq!(result.unmatched_detections, vec![0]);
    }

    #[test]
    fn test_associate_one_to_one() {
        let tracks = [
            rect(0.0, 0.0, 10.0, 10.0),
            rect(1.0, 0.0, 11.0, 10.0),
            rect(100.0, 100.0, 110.0, 110.0),
        ];
        let dets = [rect(0.0, 0.0, 10.0, 10.0), rect(101.0, 100.0, 111.0, 110.0)];
        let result = associate(&tracks, &dets, 0.5);

        assert_eq!(result.matches, vec![(0, 0), (2, 1)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_associate_is_reproducible() {
        let tracks = [rect(0.0, 0.0, 10.0, 10.0), rect(0.0, 0.0, 10.0, 10.0)];
        let dets = [rect(0.0, 0.0, 10.0, 10.0), rect(0.0, 0.0, 10.0, 10.0)];
        let first = associate(&tracks, &dets, 0.5);
        for _ in 0..10 {
            assert_eq!(associate(&tracks, &dets, 0.5), first);
        }
        assert_eq!(first.matches.len(), 2);
    }

    #[test]
    fn test_ties_go_to_lowest_indices() {
        let face = rect(0.0, 0.0, 10.0, 10.0);
        let tracks = [face; 6];
        let dets = [face; 2];
        let result = associate(&tracks, &dets, 0.5);

        assert_eq!(result.matches, vec![(0, 0), (1, 1)]);
        assert_eq!(result.unmatched_tracks, vec![2, 3, 4, 5]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_ties_prefer_lower_detection() {
        let costs = array![[0.2, 0.2, 0.2]];
        assert_eq!(linear_assignment(&costs), vec![(0, 0)]);

        let costs = array![[0.5, 0.5, 0.1], [0.5, 0.5, 0.9]];
        assert_eq!(linear_assignment(&costs), vec![(0, 2), (1, 0)]);
    }
}
