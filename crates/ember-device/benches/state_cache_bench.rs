use criterion::{criterion_group, criterion_main, Criterion};
use ember_core::math::Viewport;
use ember_core::renderer::{GraphicsApi, TextureBindTarget};
use ember_device::StateCache;
use ember_infra::{HeadlessConfig, HeadlessGl};
use std::hint::black_box;

fn bench_state_cache(c: &mut Criterion) {
    let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
    let textures: Vec<_> = (0..8).filter_map(|_| gl.create_texture()).collect();
    let mut cache = StateCache::new();

    let mut group = c.benchmark_group("State Cache");

    group.bench_function("Redundant viewport (suppressed)", |b| {
        let viewport = Viewport::new(0, 0, 1280, 720);
        cache.set_viewport(&mut gl, viewport, false);
        b.iter(|| {
            cache.set_viewport(&mut gl, black_box(viewport), false);
        });
    });

    group.bench_function("Texture unit churn (forwarded)", |b| {
        let mut frame = 0usize;
        b.iter(|| {
            for (unit, _) in textures.iter().enumerate() {
                let texture = textures[(unit + frame) % textures.len()];
                cache.bind_texture(&mut gl, unit as u32, TextureBindTarget::Texture2D, Some(texture), false);
            }
            frame += 1;
            gl.clear_calls();
        });
    });

    group.bench_function("Deferred states, nothing dirty", |b| {
        cache.apply_states(&mut gl);
        b.iter(|| {
            cache.apply_states(black_box(&mut gl));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_state_cache);
criterion_main!(benches);
