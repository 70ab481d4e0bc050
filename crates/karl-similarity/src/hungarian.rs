//! O(n^3) maximum-weight bipartite matching: dual-variable (Kuhn-Munkres)
//! labeling with slack updates, ported from a row-reduction formulation
//! rather than the classical "augment one unit at a time" textbook
//! presentation — each of the `n` outer rounds grows the matching by
//! exactly one edge.

use std::collections::VecDeque;

struct Solver {
    n: usize,
    orig_height: usize,
    orig_width: usize,
    cost: Vec<Vec<f64>>,
    xy: Vec<Option<usize>>,
    yx: Vec<Option<usize>>,
    aug_path: Vec<Option<usize>>,
    s: Vec<bool>,
    t: Vec<bool>,
    slack: Vec<f64>,
    slackx: Vec<usize>,
}

impl Solver {
    /// Builds the padded `n x n` reduced-cost matrix from an
    /// `orig_height x orig_width` similarity matrix. Initial feasible
    /// labeling: subtract each row's own maximum. Padding rows (beyond
    /// `orig_height`) get a uniform zero-similarity row, matching a real
    /// row whose every entry is the least possible similarity.
    fn new(sim: &[Vec<f64>], orig_height: usize, orig_width: usize) -> Self {
        let n = orig_height.max(orig_width);
        let mut cost = vec![vec![0.0f64; n]; n];

        for (x, row) in cost.iter_mut().enumerate() {
            let row_max = if x < orig_height {
                (0..orig_width).map(|y| sim[x][y]).fold(f64::MIN, f64::max)
            } else {
                0.0
            };
            row.fill(row_max);
            if x < orig_height {
                for (y, cell) in row.iter_mut().enumerate().take(orig_width) {
                    *cell -= sim[x][y];
                }
            }
        }

        Self {
            n,
            orig_height,
            orig_width,
            cost,
            xy: vec![None; n],
            yx: vec![None; n],
            aug_path: vec![None; n],
            s: vec![false; n],
            t: vec![false; n],
            slack: vec![f64::MAX; n],
            slackx: vec![0; n],
        }
    }

    fn compute_slack(&mut self, x: usize) {
        for y in 0..self.n {
            if self.cost[x][y] >= self.slack[y] {
                continue;
            }
            self.slack[y] = self.cost[x][y];
            self.slackx[y] = x;
        }
    }

    fn assign(&mut self, x: usize, y: usize) {
        self.xy[x] = Some(y);
        self.yx[y] = Some(x);
    }

    fn add_to_path(&mut self, x: usize, prevx: usize) {
        self.aug_path[x] = Some(prevx);
        self.s[x] = true;
        self.compute_slack(x);
    }

    fn update_labels(&mut self) {
        let mut delta = f64::MAX;
        for i in 0..self.n {
            if !self.t[i] {
                delta = delta.min(self.slack[i]);
            }
        }
        for i in 0..self.n {
            if self.s[i] {
                for y in 0..self.n {
                    self.cost[i][y] -= delta;
                }
            }
            if self.t[i] {
                for x in 0..self.n {
                    self.cost[x][i] += delta;
                }
            } else {
                self.slack[i] -= delta;
            }
        }
    }

    fn flip_edges(&mut self, start: (usize, usize)) {
        let mut cx = Some(start.0);
        let mut cy = Some(start.1);
        while let Some(x) = cx {
            let ty = self.xy[x];
            self.assign(x, cy.expect("flip_edges always carries a column"));
            cx = self.aug_path[x];
            cy = ty;
        }
    }

    fn build_path_bfs(&mut self, queue: &mut VecDeque<usize>) -> Option<(usize, usize)> {
        while let Some(x) = queue.pop_front() {
            for y in 0..self.n {
                if self.t[y] || self.cost[x][y] != 0.0 {
                    continue;
                }
                match self.yx[y] {
                    None => return Some((x, y)),
                    Some(yxy) => {
                        self.t[y] = true;
                        queue.push_back(yxy);
                        self.add_to_path(yxy, x);
                    }
                }
            }
        }
        None
    }

    fn enhance_path(&mut self, queue: &mut VecDeque<usize>) -> Option<(usize, usize)> {
        for y in 0..self.n {
            if self.t[y] || self.slack[y] != 0.0 {
                continue;
            }
            match self.yx[y] {
                None => return Some((self.slackx[y], y)),
                Some(yxy) => {
                    self.t[y] = true;
                    if self.s[yxy] {
                        continue;
                    }
                    queue.push_back(yxy);
                    let prevx = self.slackx[y];
                    self.add_to_path(yxy, prevx);
                }
            }
        }
        None
    }

    fn find_matching(&mut self) {
        for _ in 0..self.n {
            let mut queue: VecDeque<usize> = VecDeque::new();
            self.s.fill(false);
            self.t.fill(false);
            self.slack.fill(f64::MAX);
            self.slackx.fill(0);
            self.aug_path.fill(None);

            for x in 0..self.n {
                if self.xy[x].is_some() {
                    continue;
                }
                queue.push_back(x);
                self.s[x] = true;
                self.compute_slack(x);
                break;
            }

            let start = loop {
                if let Some(start) = self.build_path_bfs(&mut queue) {
                    break start;
                }
                self.update_labels();
                queue.clear();
                if let Some(start) = self.enhance_path(&mut queue) {
                    break start;
                }
            };

            self.flip_edges(start);
        }
    }

    fn produce(&self) -> Vec<(usize, usize)> {
        (0..self.orig_height)
            .filter_map(|row| self.xy[row].and_then(|col| (col < self.orig_width).then_some((row, col))))
            .collect()
    }
}

/// Solves maximum-weight bipartite matching over an `orig_height x
/// orig_width` similarity matrix (`sim[row][col]`). Returns up to
/// `min(orig_height, orig_width)` matched `(row, col)` pairs indexing the
/// original, unpadded matrix.
#[must_use]
pub fn solve_max(sim: &[Vec<f64>], orig_height: usize, orig_width: usize) -> Vec<(usize, usize)> {
    if orig_height == 0 || orig_width == 0 {
        return Vec::new();
    }
    let mut solver = Solver::new(sim, orig_height, orig_width);
    solver.find_matching();
    solver.produce()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_identity_on_diagonal_preferred_matrix() {
        let sim = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        let mut matching = solve_max(&sim, 3, 3);
        matching.sort_unstable();
        assert_eq!(matching, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn handles_rectangular_matrix() {
        // 2 rows, 3 columns: best matching pairs row 0 with col 1 (0.9) and
        // row 1 with col 2 (0.8), leaving col 0 unmatched.
        let sim = vec![vec![0.1, 0.9, 0.2], vec![0.3, 0.4, 0.8]];
        let mut matching = solve_max(&sim, 2, 3);
        matching.sort_unstable();
        assert_eq!(matching, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn empty_matrix_yields_no_matches() {
        assert_eq!(solve_max(&[], 0, 0), Vec::new());
    }

    /// All `k`-length orderings of `items` (the column indices eligible to
    /// be matched against rows `0..k`), scored and maximised by the caller.
    fn permutations_of_len(items: &[usize], k: usize) -> Vec<Vec<usize>> {
        if k == 0 {
            return vec![Vec::new()];
        }
        (0..items.len())
            .flat_map(|i| {
                let mut rest = items.to_vec();
                let head = rest.remove(i);
                permutations_of_len(&rest, k - 1)
                    .into_iter()
                    .map(move |mut tail| {
                        tail.insert(0, head);
                        tail
                    })
            })
            .collect()
    }

    fn brute_force_max(sim: &[Vec<f64>], height: usize, width: usize) -> f64 {
        let cols: Vec<usize> = (0..width).collect();
        let k = height.min(width);

        permutations_of_len(&cols, k)
            .iter()
            .map(|chosen| chosen.iter().enumerate().map(|(row, &col)| sim[row][col]).sum())
            .fold(f64::MIN, f64::max)
    }

    /// Invariant 7: on small random matrices, the Hungarian assignment's
    /// total weight matches the brute-force maximum over every possible
    /// matching.
    #[test]
    fn hungarian_matches_brute_force_on_random_matrices() {
        use rand::Rng;

        let mut rng = rand::rng();
        for _ in 0..20 {
            let height = rng.random_range(1..=4);
            let width = rng.random_range(1..=4);
            let sim: Vec<Vec<f64>> = (0..height)
                .map(|_| (0..width).map(|_| rng.random_range(0.0..1.0)).collect())
                .collect();

            let matching = solve_max(&sim, height, width);
            let found: f64 = matching.iter().map(|&(r, c)| sim[r][c]).sum();
            let optimal = brute_force_max(&sim, height, width);

            assert!(
                (found - optimal).abs() < 1e-6,
                "height={height} width={width} sim={sim:?} found={found} optimal={optimal}"
            );
        }
    }
}
