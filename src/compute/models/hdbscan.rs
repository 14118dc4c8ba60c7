//! HDBSCAN hierarchical density-based clustering.
//!
//! Steps:
//! 1. Core distance of each point (distance to its `min_samples`-th nearest
//!    neighbor, counting the point itself)
//! 2. Minimum spanning tree over mutual reachability distances (Prim)
//! 3. Single-linkage hierarchy from the sorted MST edges
//! 4. Condensed tree respecting `min_cluster_size`
//! 5. Excess-of-mass cluster selection, optionally merged up to
//!    `cluster_selection_epsilon`

use std::collections::{HashSet, VecDeque};

use crate::schema::{Dataset, ParamMap, ParamValue};

use super::{
    AlgorithmKind, ClusterModel, Metric, ModelError, NOISE, bool_param, check_known,
    metric_param, non_negative_param, usize_param,
};

const PARAM_NAMES: [&str; 5] = [
    "allow_single_cluster",
    "cluster_selection_epsilon",
    "metric",
    "min_cluster_size",
    "min_samples",
];

/// Smallest distance used when converting to lambda = 1 / distance.
const MIN_DISTANCE: f64 = 1e-10;

/// HDBSCAN clustering.
#[derive(Debug, Clone)]
pub struct Hdbscan {
    params: ParamMap,
    labels: Option<Vec<i64>>,
}

impl Default for Hdbscan {
    fn default() -> Self {
        Self::new()
    }
}

struct Settings {
    allow_single_cluster: bool,
    epsilon: f64,
    metric: Metric,
    min_cluster_size: usize,
    min_samples: usize,
}

impl Hdbscan {
    pub fn new() -> Self {
        let params = [
            ("allow_single_cluster", ParamValue::Bool(false)),
            ("cluster_selection_epsilon", ParamValue::Float(0.0)),
            ("metric", ParamValue::from("euclidean")),
            ("min_cluster_size", ParamValue::Int(5)),
            ("min_samples", ParamValue::Int(5)),
        ]
        .into_iter()
        .collect();

        Self {
            params,
            labels: None,
        }
    }

    fn settings(&self, data: &Dataset) -> Result<Settings, ModelError> {
        check_known(self.kind(), &self.params, &PARAM_NAMES)?;
        let settings = Settings {
            allow_single_cluster: bool_param(&self.params, "allow_single_cluster")?,
            epsilon: non_negative_param(&self.params, "cluster_selection_epsilon")?,
            metric: metric_param(&self.params, data)?,
            min_cluster_size: usize_param(&self.params, "min_cluster_size", 2)?,
            min_samples: usize_param(&self.params, "min_samples", 1)?,
        };
        if settings.min_samples > data.n_rows() {
            return Err(ModelError::InvalidParameter {
                name: "min_samples".to_string(),
                value: settings.min_samples.to_string(),
                expected: "at most the number of samples",
            });
        }
        Ok(settings)
    }
}

impl ClusterModel for Hdbscan {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Hdbscan
    }

    fn params(&self) -> &ParamMap {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamMap {
        &mut self.params
    }

    fn fit(&mut self, data: &Dataset) -> Result<(), ModelError> {
        self.labels = None;
        let s = self.settings(data)?;

        let n = data.n_rows();
        let core = core_distances(data, s.metric, s.min_samples);
        let mst = build_mst(data, s.metric, &core);
        let merges = single_linkage(&mst, n);
        let tree = CondensedTree::new(&merges, n, s.min_cluster_size);
        let selected = tree.select_clusters(s.allow_single_cluster, s.epsilon);

        self.labels = Some(tree.label_points(&selected));
        Ok(())
    }

    fn labels(&self) -> Option<&[i64]> {
        self.labels.as_deref()
    }
}

fn core_distances(data: &Dataset, metric: Metric, min_samples: usize) -> Vec<f64> {
    let n = data.n_rows();
    (0..n)
        .map(|i| {
            let mut d: Vec<f64> = (0..n)
                .map(|j| metric.distance(data.row(i), data.row(j)))
                .collect();
            d.sort_by(f64::total_cmp);
            d[(min_samples - 1).min(n - 1)]
        })
        .collect()
}

/// Prim's algorithm over mutual reachability distances, edges sorted by weight.
fn build_mst(data: &Dataset, metric: Metric, core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = data.n_rows();
    let reach = |i: usize, j: usize| {
        metric
            .distance(data.row(i), data.row(j))
            .max(core[i])
            .max(core[j])
    };

    let mut in_tree = vec![false; n];
    let mut min_dist = vec![f64::INFINITY; n];
    let mut min_edge = vec![0usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    in_tree[0] = true;
    for j in 1..n {
        min_dist[j] = reach(0, j);
    }

    for _ in 1..n {
        let next = (0..n)
            .filter(|&j| !in_tree[j])
            .min_by(|&a, &b| min_dist[a].total_cmp(&min_dist[b]));
        let Some(next) = next else { break };

        in_tree[next] = true;
        edges.push((min_edge[next], next, min_dist[next]));

        for j in 0..n {
            if !in_tree[j] {
                let d = reach(next, j);
                if d < min_dist[j] {
                    min_dist[j] = d;
                    min_edge[j] = next;
                }
            }
        }
    }

    edges.sort_by(|a, b| a.2.total_cmp(&b.2));
    edges
}

/// Internal node `n + i` of the single-linkage hierarchy.
#[derive(Debug, Clone)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

fn single_linkage(mst: &[(usize, usize, f64)], n: usize) -> Vec<Merge> {
    fn find(parent: &mut [usize], i: usize) -> usize {
        if parent[i] != i {
            parent[i] = find(parent, parent[i]);
        }
        parent[i]
    }

    let mut parent: Vec<usize> = (0..n).collect();
    // Hierarchy node currently representing each union-find root
    let mut node_of: Vec<usize> = (0..n).collect();
    let mut merges: Vec<Merge> = Vec::with_capacity(n.saturating_sub(1));

    for &(a, b, distance) in mst {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra == rb {
            continue;
        }
        let (left, right) = (node_of[ra], node_of[rb]);
        let size = node_size(left, n, &merges) + node_size(right, n, &merges);
        merges.push(Merge {
            left,
            right,
            distance,
            size,
        });
        parent[rb] = ra;
        node_of[ra] = n + merges.len() - 1;
    }

    merges
}

fn node_size(node: usize, n: usize, merges: &[Merge]) -> usize {
    if node < n { 1 } else { merges[node - n].size }
}

/// Points under a hierarchy node.
fn leaves(node: usize, n: usize, merges: &[Merge]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(x) = stack.pop() {
        if x < n {
            out.push(x);
        } else {
            stack.push(merges[x - n].left);
            stack.push(merges[x - n].right);
        }
    }
    out
}

fn lambda(distance: f64) -> f64 {
    1.0 / distance.max(MIN_DISTANCE)
}

/// Condensed cluster tree. Points are ids `0..n`, clusters `n..n + count`
/// with the root at `n`.
struct CondensedTree {
    n: usize,
    cluster_count: usize,
    /// (parent cluster, child point or cluster, lambda, child size)
    edges: Vec<(usize, usize, f64, usize)>,
}

impl CondensedTree {
    fn new(merges: &[Merge], n: usize, min_cluster_size: usize) -> Self {
        let mut tree = Self {
            n,
            cluster_count: 1,
            edges: Vec::new(),
        };
        if merges.is_empty() {
            // A single point falls out of the root immediately
            for p in 0..n {
                tree.edges.push((n, p, 0.0, 1));
            }
            return tree;
        }

        let root = n + merges.len() - 1;
        let mut relabel = vec![0usize; n + merges.len()];
        relabel[root] = n;
        let mut queue = VecDeque::from([root]);

        while let Some(node) = queue.pop_front() {
            let m = &merges[node - n];
            let lam = lambda(m.distance);
            let parent = relabel[node];
            let left_size = node_size(m.left, n, merges);
            let right_size = node_size(m.right, n, merges);

            match (left_size >= min_cluster_size, right_size >= min_cluster_size) {
                (true, true) => {
                    for (child, size) in [(m.left, left_size), (m.right, right_size)] {
                        relabel[child] = n + tree.cluster_count;
                        tree.cluster_count += 1;
                        tree.edges.push((parent, relabel[child], lam, size));
                        queue.push_back(child);
                    }
                }
                (false, false) => {
                    for child in [m.left, m.right] {
                        for p in leaves(child, n, merges) {
                            tree.edges.push((parent, p, lam, 1));
                        }
                    }
                }
                (true, false) | (false, true) => {
                    let (big, small) = if left_size >= min_cluster_size {
                        (m.left, m.right)
                    } else {
                        (m.right, m.left)
                    };
                    relabel[big] = parent;
                    queue.push_back(big);
                    for p in leaves(small, n, merges) {
                        tree.edges.push((parent, p, lam, 1));
                    }
                }
            }
        }

        tree
    }

    fn root(&self) -> usize {
        self.n
    }

    fn parent_of(&self, child: usize) -> Option<usize> {
        self.edges
            .iter()
            .find(|e| e.1 == child)
            .map(|e| e.0)
    }

    /// Lambda at which a cluster splits off its parent (0 for the root).
    fn birth_lambda(&self, cluster: usize) -> f64 {
        self.edges
            .iter()
            .find(|e| e.1 == cluster)
            .map_or(0.0, |e| e.2)
    }

    fn child_clusters(&self, cluster: usize) -> Vec<usize> {
        self.edges
            .iter()
            .filter(|e| e.0 == cluster && e.1 >= self.n)
            .map(|e| e.1)
            .collect()
    }

    /// Cluster ids under `cluster`, including itself.
    fn descendants(&self, cluster: usize) -> Vec<usize> {
        let mut out = vec![cluster];
        let mut i = 0;
        while i < out.len() {
            out.extend(self.child_clusters(out[i]));
            i += 1;
        }
        out
    }

    fn stability(&self, cluster: usize) -> f64 {
        let birth = self.birth_lambda(cluster);
        self.edges
            .iter()
            .filter(|e| e.0 == cluster)
            .map(|e| (e.2 - birth) * e.3 as f64)
            .sum()
    }

    /// Excess-of-mass selection, then epsilon merging.
    fn select_clusters(&self, allow_single_cluster: bool, epsilon: f64) -> Vec<usize> {
        let root = self.root();
        let ids: Vec<usize> = (root..root + self.cluster_count).collect();
        let mut stability: Vec<f64> = ids.iter().map(|&c| self.stability(c)).collect();
        let mut selected = vec![true; self.cluster_count];
        if !allow_single_cluster {
            selected[0] = false;
        }

        // Children always carry larger ids than their parents
        for &c in ids.iter().rev() {
            if c == root && !allow_single_cluster {
                continue;
            }
            let subtree: f64 = self
                .child_clusters(c)
                .iter()
                .map(|&child| stability[child - root])
                .sum();
            if subtree > stability[c - root] {
                selected[c - root] = false;
                stability[c - root] = subtree;
            } else {
                for d in self.descendants(c).into_iter().skip(1) {
                    selected[d - root] = false;
                }
            }
        }

        let chosen: Vec<usize> = ids.into_iter().filter(|&c| selected[c - root]).collect();
        if epsilon <= 0.0 {
            return chosen;
        }
        self.epsilon_merge(&chosen, allow_single_cluster, epsilon)
    }

    /// Replace clusters born below `epsilon` with their closest ancestor born
    /// above it.
    fn epsilon_merge(&self, chosen: &[usize], allow_single_cluster: bool, epsilon: f64) -> Vec<usize> {
        let root = self.root();
        let mut result = Vec::new();
        let mut processed = HashSet::new();

        for &leaf in chosen {
            if processed.contains(&leaf) {
                continue;
            }
            let birth_distance = 1.0 / self.birth_lambda(leaf);
            let target = if birth_distance < epsilon {
                let mut current = leaf;
                loop {
                    match self.parent_of(current) {
                        Some(p) if p == root => {
                            break if allow_single_cluster { root } else { current };
                        }
                        Some(p) if 1.0 / self.birth_lambda(p) > epsilon => break p,
                        Some(p) => current = p,
                        None => break current,
                    }
                }
            } else {
                leaf
            };

            processed.extend(self.descendants(target));
            if !result.contains(&target) {
                result.push(target);
            }
        }

        result
    }

    /// Label each point with the selected cluster above it, or noise.
    fn label_points(&self, selected: &[usize]) -> Vec<i64> {
        let mut ordered = selected.to_vec();
        ordered.sort_unstable();

        (0..self.n)
            .map(|p| {
                let mut current = self.parent_of(p);
                while let Some(c) = current {
                    if let Ok(label) = ordered.binary_search(&c) {
                        return label as i64;
                    }
                    current = self.parent_of(c);
                }
                NOISE
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(pairs: &[(&str, ParamValue)]) -> Hdbscan {
        let mut model = Hdbscan::new();
        let overrides: ParamMap = pairs.iter().cloned().collect();
        model.set_params(&overrides);
        model
    }

    fn three_blobs() -> Dataset {
        Dataset::gaussian_blobs(
            &[vec![0.0, 0.0], vec![10.0, 0.0], vec![0.0, 10.0]],
            12,
            0.3,
            5,
        )
        .unwrap()
    }

    #[test]
    fn test_finds_three_blobs() {
        let data = three_blobs();
        // No blob of 12 can split into two clusters of 7
        let mut model = configured(&[("min_cluster_size", ParamValue::Int(7))]);
        model.fit(&data).unwrap();
        let labels = model.labels().unwrap();

        let distinct: HashSet<i64> = labels.iter().copied().filter(|&l| l != NOISE).collect();
        assert_eq!(distinct.len(), 3);
        // Points of one blob never share a label with another blob
        for (a, b) in [(0, 12), (12, 24), (0, 24)] {
            let la: HashSet<i64> = labels[a..a + 12].iter().copied().filter(|&l| l != NOISE).collect();
            let lb: HashSet<i64> = labels[b..b + 12].iter().copied().filter(|&l| l != NOISE).collect();
            assert!(la.is_disjoint(&lb));
        }
    }

    #[test]
    fn test_single_cluster_is_noise_unless_allowed() {
        let data = Dataset::gaussian_blobs(&[vec![0.0, 0.0]], 20, 0.5, 9).unwrap();

        let mut model = configured(&[("min_cluster_size", ParamValue::Int(15))]);
        model.fit(&data).unwrap();
        assert!(model.labels().unwrap().iter().all(|&l| l == NOISE));

        let mut model = configured(&[
            ("min_cluster_size", ParamValue::Int(15)),
            ("allow_single_cluster", ParamValue::Bool(true)),
        ]);
        model.fit(&data).unwrap();
        assert!(model.labels().unwrap().iter().all(|&l| l == 0));
    }

    #[test]
    fn test_epsilon_merges_close_clusters() {
        // Two tight pairs of groups; a large epsilon merges each pair
        let data = Dataset::gaussian_blobs(
            &[
                vec![0.0, 0.0],
                vec![1.5, 0.0],
                vec![30.0, 0.0],
                vec![31.5, 0.0],
            ],
            8,
            0.05,
            2,
        )
        .unwrap();

        let mut fine = configured(&[("min_samples", ParamValue::Int(3))]);
        fine.fit(&data).unwrap();
        let fine_count: HashSet<i64> = fine.labels().unwrap().iter().copied().collect();

        let mut merged = configured(&[
            ("min_samples", ParamValue::Int(3)),
            ("cluster_selection_epsilon", ParamValue::Float(5.0)),
        ]);
        merged.fit(&data).unwrap();
        let labels = merged.labels().unwrap();
        let merged_count: HashSet<i64> = labels.iter().copied().filter(|&l| l != NOISE).collect();

        assert!(fine_count.len() >= merged_count.len());
        assert_eq!(merged_count.len(), 2);
        assert_eq!(labels[0], labels[8]);
        assert_ne!(labels[0], labels[16]);
    }

    #[test]
    fn test_min_samples_larger_than_data_fails() {
        let data = Dataset::from_rows(vec![vec![0.0], vec![1.0]]).unwrap();
        let mut model = Hdbscan::new();
        assert!(matches!(
            model.fit(&data),
            Err(ModelError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_min_cluster_size_must_be_at_least_two() {
        let data = three_blobs();
        let mut model = configured(&[("min_cluster_size", ParamValue::Int(1))]);
        assert!(model.fit(&data).is_err());
    }

    #[test]
    fn test_single_linkage_sizes() {
        let mst = vec![(0, 1, 1.0), (2, 3, 1.0), (1, 2, 5.0)];
        let merges = single_linkage(&mst, 4);
        assert_eq!(merges.len(), 3);
        assert_eq!(merges[2].size, 4);
        let mut all = leaves(6, 4, &merges);
        all.sort();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }
}
