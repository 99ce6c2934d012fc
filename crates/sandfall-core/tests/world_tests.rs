use glam::Vec2;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use sandfall_core::simulation::{CHUNK_H, CHUNK_W, MaterialId, MaterialInstance, Materials};
use sandfall_core::world::mesh::{extract_solid_loops, loops_contain};
use sandfall_core::world::{
    CellularAutomaton, ChunkManager, ChunkState, NoopStats, Particle, TileGrid, World,
    WorldConfig, WorldEvent, WorldGenerator, Zone,
};

fn small_config() -> WorldConfig {
    WorldConfig {
        width: CHUNK_W * 2,
        height: CHUNK_H * 2,
        seed: 5,
        ..Default::default()
    }
}

fn tile(materials: &Materials, id: u16) -> MaterialInstance {
    MaterialInstance::from_def(materials.get(id))
}

fn temp_root(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("sandfall_it_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn test_sand_falls_one_cell_per_tick() {
    let materials = Materials::new();
    let mut grid = TileGrid::new(10, 10).unwrap();
    grid.set_tile(5, 0, tile(&materials, MaterialId::SAND));
    grid.clear_dirty();

    let mut automaton = CellularAutomaton::new();
    let mut rng = Xoshiro256StarStar::seed_from_u64(0);
    let report = automaton.tick(
        &mut grid,
        &materials,
        &Zone::new(0, 0, 10, 10),
        &mut rng,
        &mut NoopStats,
        0,
    );

    assert_eq!(report.moved, 1);
    assert!(grid.get_tile(5, 0).is_some_and(|t| t.is_air()));
    assert_eq!(grid.material_at(5, 1), Some(MaterialId::SAND));
    assert!(grid.is_dirty(5, 0));
    assert!(grid.is_dirty(5, 1));
}

#[test]
fn test_chunk_states_never_move_backwards() {
    let materials = Materials::new();
    let generator = WorldGenerator::new(77);
    let mut grid = TileGrid::new(CHUNK_W * 3, CHUNK_H * 3).unwrap();
    let mut manager = ChunkManager::new();
    manager.set_origin(glam::IVec2::new(-(CHUNK_W as i32), -(CHUNK_H as i32)));
    for cy in -2..=2 {
        for cx in -2..=2 {
            manager.queue_load(cx, cy, true, cx.abs() <= 1 && cy.abs() <= 1);
        }
    }

    let coords: Vec<(i32, i32)> = (-2..=2)
        .flat_map(|cy| (-2..=2).map(move |cx| (cx, cy)))
        .collect();
    let mut last: Vec<Option<ChunkState>> = vec![None; coords.len()];
    for _ in 0..10 {
        manager.frame(&mut grid, &generator, &materials, None);
        for (i, &(cx, cy)) in coords.iter().enumerate() {
            let now = manager.state_of(cx, cy);
            if let (Some(before), Some(now)) = (last[i], now) {
                assert!(now >= before, "chunk ({cx}, {cy}) went from {before:?} to {now:?}");
            }
            last[i] = now;
        }
    }

    assert_eq!(manager.state_of(0, 0), Some(ChunkState::Merged));
    assert!(!manager.has_pending_merge());
}

#[test]
fn test_explosion_carves_stone_into_fragments() {
    let mut world = World::new(small_config(), Materials::new()).unwrap();
    let stone = tile(world.materials(), MaterialId::STONE);
    for y in 20..108 {
        for x in 20..108 {
            world.set_tile(x, y, stone);
        }
    }
    world.dispatch_events(&mut |_: &WorldEvent| {});

    let (cx, cy, r) = (64, 64, 30);
    let bodies = world.explosion(cx, cy, r);

    let mut carved = 0;
    for y in cy - r..=cy + r {
        for x in cx - r..=cx + r {
            if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                carved += 1;
                assert!(world.get_tile(x, y).is_some_and(|t| t.is_air()));
            }
        }
    }
    // Outside the blast the stone stands
    assert_eq!(world.get_tile(cx + r + 2, cy), Some(stone));

    assert_eq!(bodies.len(), 4);
    let mut fragment_tiles = 0;
    for id in &bodies {
        let body = world.bodies().body(*id).unwrap();
        assert!(body.tile_count() > 0);
        assert!(body
            .tiles()
            .tiles
            .iter()
            .filter(|t| !t.is_air())
            .all(|t| t.material_id == MaterialId::STONE));
        fragment_tiles += body.tile_count();
    }
    assert_eq!(fragment_tiles, carved);

    let mut created = 0;
    let mut explosions = 0;
    world.dispatch_events(&mut |e: &WorldEvent| match e {
        WorldEvent::BodyCreated { .. } => created += 1,
        WorldEvent::Explosion { radius, .. } => {
            assert_eq!(*radius, 30);
            explosions += 1;
        }
        _ => {}
    });
    assert_eq!(created, 4);
    assert_eq!(explosions, 1);
}

#[test]
fn test_particle_expires_without_merging() {
    let mut world = World::new(small_config(), Materials::new()).unwrap();
    let water = tile(world.materials(), MaterialId::WATER);
    world.spawn_particle(
        Particle::new(water, Vec2::new(40.5, 40.5), Vec2::ZERO).with_lifetime(6),
    );

    for _ in 0..5 {
        world.tick();
    }
    assert_eq!(world.particles().len(), 1);

    let summary = world.tick();
    assert_eq!(summary.particles.expired, 1);
    assert!(world.particles().is_empty());
    assert_eq!(world.grid().count_material(MaterialId::WATER), 0);

    let mut settled = 0;
    let mut killed = 0;
    world.dispatch_events(&mut |e: &WorldEvent| match e {
        WorldEvent::ParticleSettled { .. } => settled += 1,
        WorldEvent::ParticleKilled { .. } => killed += 1,
        _ => {}
    });
    assert_eq!(settled, 0);
    assert_eq!(killed, 1);
}

#[test]
fn test_world_mesh_rebuild_is_idempotent() {
    let mut world = World::new(small_config(), Materials::new()).unwrap();
    world.load_initial();
    let (min, max) = world.load_zone().chunk_range().unwrap();

    let snapshot = |world: &World| {
        let mut polygons = Vec::new();
        for cy in min.y..=max.y {
            for cx in min.x..=max.x {
                let chunk = world.chunk_manager().get(cx, cy).unwrap();
                polygons.push(chunk.polygons().to_vec());
            }
        }
        polygons
    };

    let first_count = world.update_world_mesh();
    let first = snapshot(&world);
    let second_count = world.update_world_mesh();
    assert_eq!(first_count, second_count);
    assert_eq!(first, snapshot(&world));
}

#[test]
fn test_mesh_exists_only_around_solids() {
    let materials = Materials::new();
    let mut grid = TileGrid::new(16, 16).unwrap();
    let zone = Zone::new(0, 0, 16, 16);
    assert!(extract_solid_loops(&grid, &zone, &materials).is_empty());

    grid.set_tile(4, 4, tile(&materials, MaterialId::STONE));
    let loops = extract_solid_loops(&grid, &zone, &materials);
    assert_eq!(loops.len(), 1);
    assert!(loops_contain(&loops, Vec2::new(4.5, 4.5)));
    assert!(!loops_contain(&loops, Vec2::new(8.5, 8.5)));

    grid.set_tile(4, 4, MaterialInstance::AIR);
    assert!(extract_solid_loops(&grid, &zone, &materials).is_empty());
}

#[test]
fn test_saved_world_reopens_with_edits_and_seed() {
    let root = temp_root("reopen");
    let config = WorldConfig {
        world_dir: root.clone(),
        world_name: "saved".to_string(),
        seed: 42,
        ..small_config()
    };

    let (x, y) = (70, 70);
    let glass = {
        let mut world = World::open(config.clone(), Materials::new()).unwrap();
        world.load_initial();
        let glass = tile(world.materials(), MaterialId::GLASS);
        assert!(world.set_tile(x, y, glass));
        assert!(world.save().unwrap() >= 4);
        glass
    };

    let reopened_config = WorldConfig {
        seed: 999,
        ..config
    };
    let mut world = World::open(reopened_config, Materials::new()).unwrap();
    assert_eq!(world.seed(), 42);
    world.load_initial();
    assert_eq!(world.get_tile(x, y), Some(glass));

    let _ = std::fs::remove_dir_all(&root);
}
