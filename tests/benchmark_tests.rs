//! Performance smoke tests for the per-frame geometry work
//!
//! Bounds are loose enough for unoptimized builds; they catch accidental
//! quadratic blowups, not small regressions.

use shared::{
    cast_shadows, is_visible, Actor, HitAuthority, MotionResolver, OcclusionMask, Projectile,
    TileGrid, Vector2, World, REFERENCE_MAP,
};
use std::time::Instant;

fn reference_grid() -> TileGrid {
    TileGrid::from_rows(&REFERENCE_MAP, Vector2::new(800.0, 800.0)).unwrap()
}

/// Benchmarks shadow casting for every wall tile of the reference map
#[test]
fn benchmark_cast_shadows() {
    let grid = reference_grid();
    let viewpoint = Vector2::new(400.0, 300.0);

    let iterations = 1_000;
    let start = Instant::now();

    let mut polygons = 0;
    for _ in 0..iterations {
        polygons += cast_shadows(&grid, viewpoint).len();
    }

    let duration = start.elapsed();
    println!(
        "Shadow casting: {} iterations in {:?} ({:.2} μs/iter, {} polygons)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        polygons / iterations
    );

    assert!(polygons > 0);
    assert!(duration.as_millis() < 5_000);
}

/// Benchmarks rasterizing the full occlusion mask, as the renderer does each frame
#[test]
fn benchmark_occlusion_mask() {
    let grid = reference_grid();
    let viewpoint = Vector2::new(400.0, 300.0);

    let iterations = 50;
    let start = Instant::now();

    let mut covered = 0;
    for _ in 0..iterations {
        let mask = OcclusionMask::from_grid(&grid, viewpoint, 4.0);
        covered = mask.runs().len();
    }

    let duration = start.elapsed();
    println!(
        "Occlusion mask: {} iterations in {:?} ({:.2} ms/iter, {} shaded runs)",
        iterations,
        duration,
        duration.as_millis() as f64 / iterations as f64,
        covered
    );

    assert!(covered > 0);
    assert!(duration.as_millis() < 10_000);
}

/// Benchmarks line-of-sight checks between many actor pairs
#[test]
fn benchmark_visibility_queries() {
    let grid = reference_grid();
    let points: Vec<Vector2> = (0..32)
        .map(|i| Vector2::new(60.0 + (i % 8) as f32 * 90.0, 60.0 + (i / 8) as f32 * 180.0))
        .collect();

    let start = Instant::now();

    let mut visible = 0;
    for from in &points {
        for to in &points {
            if is_visible(&grid, *from, *to) {
                visible += 1;
            }
        }
    }

    let duration = start.elapsed();
    println!(
        "Visibility: {} queries in {:?} ({} visible)",
        points.len() * points.len(),
        duration,
        visible
    );

    // every point can at least see itself
    assert!(visible >= points.len());
    assert!(duration.as_millis() < 5_000);
}

/// Benchmarks projectile stepping with a crowded arena
#[test]
fn benchmark_projectile_step() {
    let mut world = World::with_grid(reference_grid());
    for id in 0..16 {
        world.insert_actor(Actor::new(id, Vector2::new(100.0 + id as f32 * 40.0, 80.0)));
    }
    let resolver = MotionResolver::new(HitAuthority::Local);

    let count = 1_000;
    world.projectiles = (0..count)
        .map(|i| {
            let angle = i as f32 * std::f32::consts::TAU / count as f32;
            Projectile {
                owner: 0,
                position: Vector2::new(400.0, 400.0),
                velocity: Vector2::new(angle.cos(), angle.sin()).scale(shared::BULLET_SPEED),
            }
        })
        .collect();

    let iterations = 100;
    let start = Instant::now();

    for _ in 0..iterations {
        resolver.step_projectiles(&mut world, 1.0 / 60.0);
    }

    let duration = start.elapsed();
    println!(
        "Projectile step: {} projectiles x {} ticks in {:?}",
        count, iterations, duration
    );

    // 100 ticks is enough for every shot to reach a wall or leave the map
    assert!(world.projectiles.is_empty());
    assert!(duration.as_millis() < 5_000);
}
