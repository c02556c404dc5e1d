// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use marrow_core::math::Mat4;
use marrow_data::essence::Essence;
use marrow_data::node::{Node, Trs};

/// Marks the local transform of `node` dirty and flags its ancestors so the next
/// propagation walks down to it.
pub fn mark_local_dirty(nodes: &mut [Node], parents: &[Option<usize>], node: usize) {
    nodes[node].local_dirty = true;
    let mut parent = parents[node];
    while let Some(p) = parent {
        if nodes[p].subtree_dirty {
            break;
        }
        nodes[p].subtree_dirty = true;
        parent = parents[p];
    }
}

/// Marks every node dirty, forcing a full recompute on the next propagation.
pub fn mark_all_dirty(nodes: &mut [Node]) {
    for node in nodes {
        node.local_dirty = true;
        node.subtree_dirty = true;
    }
}

/// Builds the local matrix of a node.
///
/// `blend` is the weight of the current pose during a cross-fade: `0` takes the
/// previous pose, `1` (or `None`) the current one. The blended TRS is composed with
/// the node's static matrix.
pub fn compute_local_transform(node: &Node, static_matrix: &Mat4, blend: Option<f32>) -> Mat4 {
    let trs: Trs = match blend {
        Some(t) if t <= 0.0 => node.previous,
        Some(t) if t < 1.0 => node.previous.blend(&node.current, t),
        _ => node.current,
    };
    trs.to_matrix() * *static_matrix
}

/// Inputs of one propagation run besides the nodes themselves.
#[derive(Debug, Clone, Copy)]
pub struct PropagationParams<'a> {
    /// World placement of the variant.
    pub placement: &'a Mat4,
    /// The placement differs from the one used in the previous run.
    pub placement_changed: bool,
    /// Cross-fade weight, see [`compute_local_transform`].
    pub blend: Option<f32>,
    /// Update generation stamped on every node whose global changes.
    pub generation: u64,
}

/// Walks the node tree root-first, recomputing only what changed.
///
/// A node's global is recomputed when its local was dirty or its parent's global
/// changed in this run; subtrees with no dirty node are skipped entirely. Mesh
/// nodes get `model = placement * global`, joints and skinned mesh nodes get their
/// inverse global. Returns the number of nodes whose global changed.
pub fn propagate_transforms(
    essence: &Essence,
    nodes: &mut [Node],
    params: PropagationParams<'_>,
) -> usize {
    let descriptions = essence.nodes();
    let parents = essence.parents();
    let mut changed_count = 0;
    let mut stack: Vec<(usize, bool)> = essence.roots().iter().rev().map(|&r| (r, false)).collect();

    while let Some((index, parent_changed)) = stack.pop() {
        let parent_global = parents[index].map(|p| nodes[p].global);
        let desc = &descriptions[index];
        let node = &mut nodes[index];

        if !parent_changed && !node.local_dirty && !node.subtree_dirty {
            continue;
        }

        let changed = parent_changed || node.local_dirty;
        if node.local_dirty {
            node.local = compute_local_transform(node, &desc.matrix, params.blend);
            node.local_dirty = false;
        }

        if changed {
            node.global = match parent_global {
                Some(parent) => parent * node.local,
                None => node.local,
            };
            node.changed_generation = params.generation;
            if desc.mesh.is_some() {
                node.model = *params.placement * node.global;
            }
            if desc.skin.is_some() || essence.is_joint(index) {
                node.inverse_global = node.global.inverse();
            }
            changed_count += 1;
        }

        node.subtree_dirty = false;
        stack.extend(desc.children.iter().rev().map(|&c| (c, changed)));
    }

    if params.placement_changed {
        for &index in essence.mesh_nodes() {
            let node = &mut nodes[index];
            node.model = *params.placement * node.global;
        }
    }

    changed_count
}
