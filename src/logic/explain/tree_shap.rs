//! Path-dependent TreeSHAP (Lundberg et al., Algorithm 2)
//!
//! Exact Shapley values of a single tree where a missing feature is handled
//! by following both children weighted by training cover. Runs in
//! O(leaves * depth^2) per tree.

use crate::logic::model::{Node, Tree};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// None for the root placeholder
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// Add this tree's attributions for `x` into `phi`, scaled by `scale`
pub fn accumulate(tree: &Tree, x: &[f64], phi: &mut [f64], scale: f64) {
    let mut local = vec![0.0; phi.len()];
    recurse(tree, 0, x, &mut local, Vec::with_capacity(16), 1.0, 1.0, None);

    for (out, value) in phi.iter_mut().zip(local) {
        *out += scale * value;
    }
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    index: usize,
    x: &[f64],
    phi: &mut [f64],
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    extend(&mut path, zero_fraction, one_fraction, feature);

    match tree.nodes[index] {
        Node::Leaf { value, .. } => {
            for i in 1..path.len() {
                let weight = unwound_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += weight * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        Node::Split { feature: split, threshold, left, right, cover } => {
            let (hot, cold) = if x[split] <= threshold { (left, right) } else { (right, left) };
            let hot_zero = tree.nodes[hot].cover() / cover;
            let cold_zero = tree.nodes[cold].cover() / cover;

            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;

            // undo a previous split on the same feature
            if let Some(k) = path.iter().position(|el| el.feature == Some(split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind(&mut path, k);
            }

            recurse(tree, hot, x, phi, path.clone(), hot_zero * incoming_zero, incoming_one, Some(split));
            recurse(tree, cold, x, phi, path, cold_zero * incoming_zero, 0.0, Some(split));
        }
    }
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let d = depth as f64;
    for i in (0..depth).rev() {
        let fi = i as f64;
        path[i + 1].pweight += one_fraction * path[i].pweight * (fi + 1.0) / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - fi) / (d + 1.0);
    }
}

fn unwind(path: &mut Vec<PathElement>, k: usize) {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[k].one_fraction;
    let zero_fraction = path[k].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (d - fi) / (d + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero_fraction * (d - fi));
        }
    }

    // shift feature data down, pweights stay where they were computed
    for i in k..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_sum(path: &[PathElement], k: usize) -> f64 {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[k].one_fraction;
    let zero_fraction = path[k].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((fi + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (d - fi) / (d + 1.0);
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((d - fi) / (d + 1.0));
        }
    }

    total
}
