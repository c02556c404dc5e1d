use criterion::{criterion_group, criterion_main, Criterion};
use marrow_core::math::{Mat4, Vec3};
use marrow_core::renderer::{BufferId, IndexFormat};
use marrow_data::essence::{Essence, GpuGeometry, MeshDescription, NodeDescription};
use marrow_data::node::Node;
use marrow_infra::HeadlessDevice;
use marrow_lanes::scene_lane::{
    mark_all_dirty, mark_local_dirty, propagate_transforms, PropagationParams,
};
use std::hint::black_box;
use std::sync::Arc;

/// A skeleton-like tree: `branches` chains of `depth` nodes under one root.
fn skeleton(branches: usize, depth: usize) -> Arc<Essence> {
    let mut nodes = vec![NodeDescription {
        name: "root".into(),
        ..Default::default()
    }];
    for b in 0..branches {
        let mut parent = 0;
        for d in 0..depth {
            let index = nodes.len();
            nodes[parent].children.push(index);
            nodes.push(NodeDescription {
                name: format!("b{b}d{d}"),
                translation: Vec3::new(0.0, 0.1, 0.0),
                ..Default::default()
            });
            parent = index;
        }
    }
    let desc = MeshDescription {
        name: "skeleton".into(),
        nodes,
        meshes: Vec::new(),
        materials: Vec::new(),
        textures: Vec::new(),
        sampler: None,
        skins: Vec::new(),
        animations: Vec::new(),
        geometry: GpuGeometry {
            vertex_buffer: BufferId(0),
            index_buffer: BufferId(0),
            index_format: IndexFormat::Uint32,
        },
    };
    Essence::new(Arc::new(HeadlessDevice::new()), desc).expect("valid skeleton")
}

fn params(generation: &mut u64) -> PropagationParams<'static> {
    *generation += 1;
    PropagationParams {
        placement: &Mat4::IDENTITY,
        placement_changed: false,
        blend: None,
        generation: *generation,
    }
}

fn bench_propagation(c: &mut Criterion) {
    // 8 chains of 16 joints, about the size of a humanoid rig.
    let essence = skeleton(8, 16);
    let mut nodes: Vec<Node> = (0..essence.node_count())
        .map(|i| Node::new(essence.rest_pose(i)))
        .collect();
    let mut generation = 0;
    propagate_transforms(&essence, &mut nodes, params(&mut generation));

    let mut group = c.benchmark_group("Transform Propagation");

    group.bench_function("Full tree (every node animated)", |b| {
        b.iter(|| {
            mark_all_dirty(&mut nodes);
            black_box(propagate_transforms(&essence, &mut nodes, params(&mut generation)));
        });
    });

    group.bench_function("Single leaf dirty", |b| {
        let leaf = essence.node_count() - 1;
        b.iter(|| {
            mark_local_dirty(&mut nodes, essence.parents(), leaf);
            black_box(propagate_transforms(&essence, &mut nodes, params(&mut generation)));
        });
    });

    group.bench_function("Steady state", |b| {
        b.iter(|| {
            black_box(propagate_transforms(&essence, &mut nodes, params(&mut generation)));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_propagation);
criterion_main!(benches);
