//! Benchmarks for the automaton tick and terrain generation

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::hint::black_box;

use sandfall_core::simulation::{CHUNK_H, CHUNK_W, MaterialId, MaterialInstance, Materials};
use sandfall_core::world::{CellularAutomaton, NoopStats, TileBlock, TileGrid, WorldGenerator, Zone};

/// A grid whose top half alternates sand and water columns
fn falling_grid(materials: &Materials, size: usize) -> TileGrid {
    let mut grid = TileGrid::new(size, size).expect("grid");
    let sand = MaterialInstance::from_def(materials.get(MaterialId::SAND));
    let water = MaterialInstance::from_def(materials.get(MaterialId::WATER));
    for y in 0..(size / 2) as i32 {
        for x in 0..size as i32 {
            grid.set_tile(x, y, if x % 2 == 0 { sand } else { water });
        }
    }
    grid
}

fn bench_tick(c: &mut Criterion) {
    let materials = Materials::new();
    let mut group = c.benchmark_group("automaton_tick");

    for size in [64usize, 256] {
        group.bench_with_input(BenchmarkId::new("grid", size), &size, |b, &size| {
            let mut automaton = CellularAutomaton::new();
            let mut rng = Xoshiro256StarStar::seed_from_u64(1);
            let zone = Zone::new(0, 0, size as i32, size as i32);
            b.iter(|| {
                let mut grid = falling_grid(&materials, size);
                for tick in 0..8 {
                    automaton.tick(&mut grid, &materials, &zone, &mut rng, &mut NoopStats, tick);
                }
                black_box(grid);
            });
        });
    }

    group.finish();
}

fn bench_terrain(c: &mut Criterion) {
    let materials = Materials::new();
    let generator = WorldGenerator::new(12345);
    c.bench_function("terrain_phase", |b| {
        b.iter(|| {
            let mut block = TileBlock::new(CHUNK_W, CHUNK_H);
            generator.terrain(black_box(3), black_box(2), &mut block, &materials);
            black_box(block);
        });
    });
}

criterion_group!(benches, bench_tick, bench_terrain);
criterion_main!(benches);
