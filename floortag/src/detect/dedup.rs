use super::detector::Detection;

/// Drop duplicate detections of the same marker id, keeping the best one.
///
/// Duplicates arise when several boundary clusters fit quads over the same
/// printed marker. Two detections duplicate each other when their ids match
/// and their outlines overlap; overlapping detections of different ids are
/// left alone, the decoder already told them apart.
pub fn deduplicate(detections: &mut Vec<Detection>) {
    let n = detections.len();
    let mut dead = vec![false; n];

    for i in 0..n {
        if dead[i] {
            continue;
        }
        for j in i + 1..n {
            if dead[j] || detections[i].id != detections[j].id {
                continue;
            }
            if !quads_overlap(&detections[i].corners, &detections[j].corners) {
                continue;
            }
            if outranks(&detections[j], &detections[i]) {
                dead[i] = true;
                break;
            }
            dead[j] = true;
        }
    }

    let mut idx = 0;
    detections.retain(|_| {
        let keep = !dead[idx];
        idx += 1;
        keep
    });
}

/// Whether `a` beats `b`: fewer corrected bits, then higher decision
/// margin, then corner order so the pick is deterministic.
fn outranks(a: &Detection, b: &Detection) -> bool {
    if a.hamming != b.hamming {
        return a.hamming < b.hamming;
    }
    if (a.decision_margin - b.decision_margin).abs() > 1e-6 {
        return a.decision_margin > b.decision_margin;
    }
    a.corners < b.corners
}

/// Separating-axis overlap test for two convex quads.
fn quads_overlap(p: &[[i32; 2]; 4], q: &[[i32; 2]; 4]) -> bool {
    !separated_by_edges_of(p, q) && !separated_by_edges_of(q, p)
}

/// Whether any edge normal of `a` strictly separates the two outlines.
fn separated_by_edges_of(a: &[[i32; 2]; 4], b: &[[i32; 2]; 4]) -> bool {
    (0..4).any(|i| {
        let ex = (a[(i + 1) % 4][0] - a[i][0]) as f64;
        let ey = (a[(i + 1) % 4][1] - a[i][1]) as f64;

        let (alo, ahi) = span(a, -ey, ex);
        let (blo, bhi) = span(b, -ey, ex);
        ahi < blo || bhi < alo
    })
}

/// Extent of a quad projected on the axis `(nx, ny)`.
fn span(quad: &[[i32; 2]; 4], nx: f64, ny: f64) -> (f64, f64) {
    quad.iter().fold((f64::MAX, f64::MIN), |(lo, hi), c| {
        let d = c[0] as f64 * nx + c[1] as f64 * ny;
        (lo.min(d), hi.max(d))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32, side: i32) -> [[i32; 2]; 4] {
        [
            [x, y],
            [x + side, y],
            [x + side, y + side],
            [x, y + side],
        ]
    }

    fn det(id: u32, hamming: u8, margin: f32, corners: [[i32; 2]; 4]) -> Detection {
        Detection {
            id,
            hamming,
            decision_margin: margin,
            corners,
            center: [0.0, 0.0],
            orientation: 0.0,
        }
    }

    fn survivors(mut dets: Vec<Detection>) -> Vec<Detection> {
        deduplicate(&mut dets);
        dets
    }

    #[test]
    fn identical_outlines_overlap() {
        let p = square(0, 0, 10);
        assert!(quads_overlap(&p, &p));
    }

    #[test]
    fn disjoint_outlines_do_not_overlap() {
        assert!(!quads_overlap(&square(0, 0, 10), &square(25, 3, 10)));
    }

    #[test]
    fn partial_overlap_is_overlap() {
        assert!(quads_overlap(&square(0, 0, 10), &square(6, 6, 10)));
    }

    #[test]
    fn edge_contact_counts_as_overlap() {
        // Separation requires a strict gap
        assert!(quads_overlap(&square(0, 0, 10), &square(10, 0, 10)));
    }

    #[test]
    fn duplicate_with_more_bit_errors_loses() {
        let c = square(0, 0, 10);
        let kept = survivors(vec![det(3, 1, 50.0, c), det(3, 0, 50.0, c)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].hamming, 0);
    }

    #[test]
    fn margin_breaks_hamming_ties() {
        let c = square(0, 0, 10);
        let kept = survivors(vec![det(3, 0, 30.0, c), det(3, 0, 50.0, c)]);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].decision_margin - 50.0).abs() < 1e-6);
    }

    #[test]
    fn different_ids_may_overlap() {
        let c = square(0, 0, 10);
        let kept = survivors(vec![det(0, 0, 50.0, c), det(1, 0, 50.0, c)]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn same_id_far_apart_both_survive() {
        let kept = survivors(vec![
            det(7, 0, 50.0, square(0, 0, 10)),
            det(7, 0, 50.0, square(40, 40, 10)),
        ]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn overlap_chains_resolve_pairwise() {
        // a overlaps b, b overlaps c, but a and c are clear of each other
        let kept = survivors(vec![
            det(5, 0, 60.0, square(0, 0, 10)),
            det(5, 0, 50.0, square(5, 0, 10)),
            det(5, 0, 55.0, square(12, 0, 10)),
        ]);
        let mut margins: Vec<f32> = kept.iter().map(|d| d.decision_margin).collect();
        margins.sort_by(f32::total_cmp);
        assert_eq!(margins, vec![55.0, 60.0]);
    }

    #[test]
    fn corner_order_settles_exact_ties() {
        let left = square(0, 0, 10);
        let right = square(1, 0, 10);
        assert!(outranks(&det(0, 0, 50.0, left), &det(0, 0, 50.0, right)));
        assert!(!outranks(&det(0, 0, 50.0, right), &det(0, 0, 50.0, left)));
        // Fully identical: neither outranks the other
        assert!(!outranks(&det(0, 0, 50.0, left), &det(0, 0, 50.0, left)));
    }
}
