use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tessera_core::mesh::{
    DrawChunks, IndexData, LayoutCache, PrimitiveTopology, VertexAttribute, VertexRecord,
    VertexRecordLayout, VertexSchema,
};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct InstancedVertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
    color: [u8; 4],
    model: [[f32; 4]; 4],
}

impl VertexRecord for InstancedVertex {
    fn schema() -> VertexSchema {
        instanced_schema()
    }
}

fn instanced_schema() -> VertexSchema {
    VertexSchema::new()
        .with(VertexAttribute::vec3("position", 0))
        .with(VertexAttribute::vec3("normal", 1))
        .with(VertexAttribute::vec2("uv", 2))
        .with(VertexAttribute::packed_color("color", 3, 4))
        .with(VertexAttribute::mat4("model", 4))
}

// ---------------------------------------------------------------------------
// Vertex layout derivation
// ---------------------------------------------------------------------------

fn bench_layout_derive(c: &mut Criterion) {
    let schema = instanced_schema();
    c.bench_function("layout_derive_5_attributes", |b| {
        b.iter(|| VertexRecordLayout::derive(black_box(&schema), black_box(16)));
    });
}

fn bench_layout_cache_hit(c: &mut Criterion) {
    let cache = LayoutCache::new(16);
    let _ = cache.get_or_derive::<InstancedVertex>();
    c.bench_function("layout_cache_hit", |b| {
        b.iter(|| black_box(cache.get_or_derive::<InstancedVertex>()));
    });
}

// ---------------------------------------------------------------------------
// Index packing
// ---------------------------------------------------------------------------

fn bench_pack_u8(c: &mut Criterion) {
    let indices: Vec<u32> = (0..6000).map(|i| i % 256).collect();
    c.bench_function("index_pack_6000_u8", |b| {
        b.iter(|| IndexData::pack(black_box(&indices)));
    });
}

fn bench_pack_u32(c: &mut Criterion) {
    let indices: Vec<u32> = (0..60000).map(|i| i * 3).collect();
    c.bench_function("index_pack_60000_u32", |b| {
        b.iter(|| IndexData::pack(black_box(&indices)));
    });
}

// ---------------------------------------------------------------------------
// Patch chunking
// ---------------------------------------------------------------------------

fn bench_patch_chunks(c: &mut Criterion) {
    let topology = PrimitiveTopology::Patches {
        vertices_per_patch: 3,
    };
    let stride = topology.patch_stride(32);
    c.bench_function("patch_chunks_30000", |b| {
        b.iter(|| DrawChunks::new(0, black_box(30000), stride).count());
    });
}

criterion_group!(layout_benches, bench_layout_derive, bench_layout_cache_hit);
criterion_group!(index_benches, bench_pack_u8, bench_pack_u32, bench_patch_chunks);
criterion_main!(layout_benches, index_benches);
