//! Verlet physics solver.
//!
//! Each `update(dt)` runs `substeps` identical substeps, every phase being
//! one (or, for collisions, one per pass) barrier-synchronised batch on the
//! worker pool:
//!
//! 1. forces: gravity added to each particle's acceleration
//! 2. boundary: particles clamped inside the domain, bouncing off walls
//! 3. grid: collision grid rebuilt from scratch
//! 4. collisions: overlapping pairs pushed apart, column passes in parallel
//! 5. integration: Verlet position update
//!
//! The boundary phase runs once more after the last substep so that readers
//! only ever see contained particles.
//!
//! The solver owns its particles. `gravity` and per-particle tweaks through
//! [`Solver::object_mut`] are meant to be written by the frame loop between
//! updates; `update` takes `&mut self`, so nothing can observe or mutate the
//! store while a frame is in flight.

mod collision;
mod config;
mod partition;
mod phases;

pub use collision::{solve_contact, CONTACT_EPSILON, FALLBACK_NORMAL};
pub use config::{ConfigError, SolverConfig};
pub use partition::ColumnPartition;

use crate::grid::{CollisionGrid, GridError};
use crate::jobs::{WorkerPool, WorkerPoolError};
use crate::math::Vec2;
use crate::particle::{Particle, ParticleId};
use crate::store::{ParticleStore, StoreError};
use crate::time::{SimulationTime, TICK_DT};
use std::sync::Arc;
use thiserror::Error;
use verlet_metrics::SystemProfiler;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid solver configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("position {position} lies outside the {domain} domain")]
    OutOfBounds { position: Vec2, domain: Vec2 },

    #[error("radius {radius} is below the configured minimum {min}")]
    RadiusTooSmall { radius: f32, min: f32 },

    #[error("radius {radius} does not fit in the {domain} domain")]
    RadiusTooLarge { radius: f32, domain: Vec2 },

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pool(#[from] WorkerPoolError),
}

/// Phase names reported to the profiler.
pub mod phase {
    pub const FORCES: &str = "forces";
    pub const BOUNDARY: &str = "boundary";
    pub const GRID: &str = "grid";
    pub const COLLISIONS: &str = "collisions";
    pub const INTEGRATION: &str = "integration";
}

pub struct Solver {
    /// Applied at the top of every substep. Only write between updates.
    pub gravity: Vec2,
    objects: ParticleStore,
    grid: CollisionGrid,
    domain: Vec2,
    config: SolverConfig,
    pool: Arc<WorkerPool>,
    partition: ColumnPartition,
    max_radius: f32,
    cell_cache: Vec<u32>,
    time: SimulationTime,
    last_sub_dt: f32,
    last_contacts: usize,
    profiler: SystemProfiler,
}

impl Solver {
    /// Solver over `[0, domain_size]` with the default configuration.
    pub fn new(domain_size: Vec2, pool: Arc<WorkerPool>) -> Result<Self, SolverError> {
        Self::with_config(domain_size, pool, SolverConfig::default())
    }

    pub fn with_config(
        domain_size: Vec2,
        pool: Arc<WorkerPool>,
        config: SolverConfig,
    ) -> Result<Self, SolverError> {
        config.validate()?;
        let grid = CollisionGrid::new(domain_size, config.cell_size())?;
        let objects = match config.max_objects {
            Some(capacity) => ParticleStore::with_capacity(capacity)?,
            None => ParticleStore::new(),
        };
        let partition = ColumnPartition::new(grid.width(), pool.thread_count(), 1);

        tracing::info!(
            domain = %domain_size,
            grid_width = grid.width(),
            grid_height = grid.height(),
            threads = pool.thread_count(),
            passes = partition.pass_count(),
            substeps = config.substeps,
            "solver ready"
        );

        Ok(Self {
            gravity: config.gravity,
            objects,
            grid,
            domain: domain_size,
            last_sub_dt: config.sub_dt(TICK_DT),
            max_radius: config.particle_radius,
            config,
            pool,
            partition,
            cell_cache: Vec::new(),
            time: SimulationTime::new(),
            last_contacts: 0,
            profiler: SystemProfiler::new(),
        })
    }

    /// Add a particle at rest with the configured radius.
    pub fn create_object(&mut self, position: Vec2) -> Result<ParticleId, SolverError> {
        self.create_object_with_radius(position, self.config.particle_radius)
    }

    /// Add a particle at rest. `radius` may not be below the configured
    /// particle radius; larger radii widen the collision neighbourhood.
    /// Requests outside the domain are rejected without side effects.
    pub fn create_object_with_radius(
        &mut self,
        position: Vec2,
        radius: f32,
    ) -> Result<ParticleId, SolverError> {
        let min = self.config.particle_radius;
        if !(radius.is_finite() && radius >= min) {
            return Err(SolverError::RadiusTooSmall { radius, min });
        }
        if 2.0 * radius > self.domain.min_element() {
            return Err(SolverError::RadiusTooLarge {
                radius,
                domain: self.domain,
            });
        }
        let inside = position.is_finite()
            && position.cmpge(Vec2::ZERO).all()
            && position.cmple(self.domain).all();
        if !inside {
            return Err(SolverError::OutOfBounds {
                position,
                domain: self.domain,
            });
        }

        let id = self.objects.create(position, radius)?;
        if radius > self.max_radius {
            self.max_radius = radius;
            self.refresh_partition();
        }
        Ok(id)
    }

    /// Remove a particle and drop it from the collision grid. Its id may be
    /// handed out again from the next `update` on.
    pub fn remove_object(&mut self, id: ParticleId) -> Result<(), SolverError> {
        self.objects.remove(id)?;
        let position = self.objects[id].position;
        self.grid.remove(id, position);
        Ok(())
    }

    /// Read-only view for renderers and diagnostics.
    #[inline]
    pub fn objects(&self) -> &ParticleStore {
        &self.objects
    }

    #[inline]
    pub fn object(&self, id: ParticleId) -> Option<&Particle> {
        self.objects.get(id)
    }

    /// Mutable access between updates, e.g. to give a particle a launch
    /// velocity or a color.
    #[inline]
    pub fn object_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.objects.get_mut(id)
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Velocity of a particle over the last substep, in world units per
    /// second.
    pub fn velocity_of(&self, id: ParticleId) -> Option<Vec2> {
        self.objects.get(id).map(|p| p.velocity(self.last_sub_dt))
    }

    #[inline]
    pub fn domain(&self) -> Vec2 {
        self.domain
    }

    #[inline]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    #[inline]
    pub fn grid(&self) -> &CollisionGrid {
        &self.grid
    }

    #[inline]
    pub fn partition(&self) -> &ColumnPartition {
        &self.partition
    }

    #[inline]
    pub fn substeps(&self) -> u32 {
        self.config.substeps
    }

    #[inline]
    pub fn sub_dt(&self, dt: f32) -> f32 {
        self.config.sub_dt(dt)
    }

    #[inline]
    pub fn time(&self) -> &SimulationTime {
        &self.time
    }

    /// Contacts resolved during the last substep.
    #[inline]
    pub fn last_contact_count(&self) -> usize {
        self.last_contacts
    }

    /// Accumulated per-phase timings (empty without the `metrics` feature).
    #[inline]
    pub fn profiler(&self) -> &SystemProfiler {
        &self.profiler
    }

    pub fn reset_profiler(&mut self) {
        self.profiler.reset();
    }

    /// Advance the simulation by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let released = self.objects.recycle();
        if released > 0 {
            tracing::debug!(released, "recycled particle slots");
        }

        let sub_dt = self.config.sub_dt(dt);
        let damping = self.config.velocity_damping(sub_dt);
        for _ in 0..self.config.substeps {
            self.substep(sub_dt, damping);
        }
        let pool = &*self.pool;
        self.profiler.time_system(phase::BOUNDARY, || {
            phases::enforce_boundary(
                pool,
                self.objects.as_mut_slice(),
                self.domain,
                self.config.boundary_damping,
            )
        });

        // `velocity_of` divides by it
        if sub_dt > 0.0 {
            self.last_sub_dt = sub_dt;
        }
        self.time.advance_frame(dt, self.config.substeps);
    }

    fn substep(&mut self, sub_dt: f32, damping: f32) {
        let pool = &*self.pool;
        let gravity = self.gravity;

        self.profiler.time_system(phase::FORCES, || {
            phases::apply_forces(pool, self.objects.as_mut_slice(), gravity)
        });
        self.profiler.time_system(phase::BOUNDARY, || {
            phases::enforce_boundary(
                pool,
                self.objects.as_mut_slice(),
                self.domain,
                self.config.boundary_damping,
            )
        });
        self.profiler.time_system(phase::GRID, || {
            phases::rebuild_grid(
                pool,
                &mut self.grid,
                self.objects.as_slice(),
                &mut self.cell_cache,
                self.config.parallel_rebuild_threshold,
            )
        });
        self.last_contacts = self.profiler.time_system(phase::COLLISIONS, || {
            collision::resolve_collisions(
                pool,
                &self.grid,
                self.objects.as_mut_slice(),
                &self.partition,
                self.config.response_coefficient,
            )
        });
        self.profiler.time_system(phase::INTEGRATION, || {
            phases::integrate(pool, self.objects.as_mut_slice(), sub_dt, damping)
        });
    }

    /// Neighbourhood reach in cells needed by the largest radius.
    fn reach(&self) -> usize {
        (self.max_radius / self.config.particle_radius).ceil() as usize
    }

    fn refresh_partition(&mut self) {
        let reach = self.reach();
        if reach != self.partition.reach() {
            self.partition = ColumnPartition::new(self.grid.width(), self.pool.thread_count(), reach);
            tracing::debug!(
                reach,
                passes = self.partition.pass_count(),
                "collision neighbourhood widened"
            );
        }
    }
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("domain", &self.domain)
            .field("objects", &self.objects.len())
            .field("gravity", &self.gravity)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{rainbow, DeterministicRng};

    fn solver(domain: Vec2, config: SolverConfig) -> Solver {
        let pool = Arc::new(WorkerPool::new(2).unwrap());
        Solver::with_config(domain, pool, config).unwrap()
    }

    fn weightless() -> SolverConfig {
        SolverConfig {
            gravity: Vec2::ZERO,
            ..SolverConfig::default()
        }
    }

    #[test]
    fn two_particles_split_overlap_in_one_collision_phase() {
        let config = SolverConfig {
            particle_radius: 1.0,
            ..weightless()
        };
        let mut s = solver(Vec2::splat(10.0), config);
        let a = s.create_object(Vec2::ZERO).unwrap();
        let b = s.create_object(Vec2::new(1.5, 0.0)).unwrap();

        let pool = Arc::clone(&s.pool);
        phases::rebuild_grid(&pool, &mut s.grid, s.objects.as_slice(), &mut s.cell_cache, 0);
        let contacts = collision::resolve_collisions(
            &pool,
            &s.grid,
            s.objects.as_mut_slice(),
            &s.partition,
            1.0,
        );

        assert_eq!(contacts, 1);
        let (pa, pb) = (s.objects[a].position, s.objects[b].position);
        assert!((pa - Vec2::new(-0.25, 0.0)).length() < 1e-6);
        assert!((pb - Vec2::new(1.75, 0.0)).length() < 1e-6);
        assert!((pa.distance(pb) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn bad_configuration_prevents_start() {
        let pool = Arc::new(WorkerPool::new(1).unwrap());
        let err = Solver::with_config(
            Vec2::splat(10.0),
            Arc::clone(&pool),
            SolverConfig {
                substeps: 0,
                ..SolverConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::Config(ConfigError::ZeroSubsteps)));

        let err = Solver::with_config(
            Vec2::new(10.0, 1.0),
            pool,
            SolverConfig {
                particle_radius: 2.0,
                ..SolverConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::Grid(GridError::DomainTooSmall { .. })));
    }

    #[test]
    fn out_of_bounds_creation_is_rejected() {
        let mut s = solver(Vec2::splat(10.0), weightless());
        for position in [
            Vec2::new(-0.1, 5.0),
            Vec2::new(5.0, 10.1),
            Vec2::new(f32::NAN, 1.0),
        ] {
            assert!(matches!(
                s.create_object(position),
                Err(SolverError::OutOfBounds { .. })
            ));
        }
        assert_eq!(s.object_count(), 0);
        assert!(s.create_object(Vec2::new(10.0, 0.0)).is_ok());
    }

    #[test]
    fn radius_limits() {
        let mut s = solver(Vec2::splat(10.0), weightless());
        assert!(matches!(
            s.create_object_with_radius(Vec2::splat(5.0), 0.25),
            Err(SolverError::RadiusTooSmall { .. })
        ));
        assert!(matches!(
            s.create_object_with_radius(Vec2::splat(5.0), 6.0),
            Err(SolverError::RadiusTooLarge { .. })
        ));
    }

    #[test]
    fn capacity_exhaustion_is_reported() {
        let mut s = solver(
            Vec2::splat(10.0),
            SolverConfig {
                max_objects: Some(1),
                ..weightless()
            },
        );
        s.create_object(Vec2::splat(5.0)).unwrap();
        assert!(matches!(
            s.create_object(Vec2::splat(2.0)),
            Err(SolverError::Store(StoreError::CapacityExhausted { capacity: 1 }))
        ));
        assert_eq!(s.object_count(), 1);
    }

    #[test]
    fn large_particles_widen_the_partition() {
        let mut s = solver(Vec2::splat(40.0), weightless());
        assert_eq!(s.partition().reach(), 1);
        s.create_object_with_radius(Vec2::splat(20.0), 1.2).unwrap();
        assert_eq!(s.partition().reach(), 3);
    }

    #[test]
    fn large_and_small_particles_separate() {
        // Friction high enough to cancel carried velocity: pure relaxation.
        let config = SolverConfig {
            air_friction: 1e7,
            ..weightless()
        };
        let mut s = solver(Vec2::splat(20.0), config);
        let big = s.create_object_with_radius(Vec2::new(10.0, 10.0), 2.0).unwrap();
        let small = s.create_object(Vec2::new(11.5, 10.0)).unwrap();
        for _ in 0..30 {
            s.update(TICK_DT);
        }
        let d = s.object(big).unwrap().position.distance(s.object(small).unwrap().position);
        assert!(d >= 2.5 - 1e-3, "distance {d}");
    }

    #[test]
    fn removed_ids_are_recycled_by_the_next_update() {
        let mut s = solver(Vec2::splat(10.0), weightless());
        let a = s.create_object(Vec2::splat(2.0)).unwrap();
        let b = s.create_object(Vec2::splat(6.0)).unwrap();
        s.remove_object(a).unwrap();
        assert!(s.object(a).is_none());
        s.update(TICK_DT);
        assert_eq!(s.object_count(), 1);
        assert!(s.object(b).is_some());
        assert_eq!(s.create_object(Vec2::splat(3.0)).unwrap(), a);
    }

    #[test]
    fn removed_particle_leaves_the_grid() {
        let mut s = solver(Vec2::splat(10.0), SolverConfig::default());
        let a = s.create_object(Vec2::new(3.0, 4.0)).unwrap();
        let b = s.create_object(Vec2::new(6.0, 4.0)).unwrap();
        s.update(TICK_DT);

        let registered = |s: &Solver, id: ParticleId| {
            (0..s.grid().cell_count()).any(|i| s.grid().cell_at(i).contains(&id))
        };
        assert!(registered(&s, a) && registered(&s, b));

        s.remove_object(a).unwrap();
        assert!(!registered(&s, a));
        assert!(registered(&s, b));
        assert_eq!(s.grid().occupancy(), 1);
        assert!(matches!(
            s.remove_object(a),
            Err(SolverError::Store(StoreError::UnknownParticle { .. }))
        ));
    }

    #[test]
    fn velocity_is_derived_from_positions() {
        let mut s = solver(Vec2::splat(10.0), weightless());
        let id = s.create_object(Vec2::splat(5.0)).unwrap();
        s.object_mut(id).unwrap().add_velocity(Vec2::new(0.01, 0.0));
        s.update(TICK_DT);
        let v = s.velocity_of(id).unwrap();
        assert!(v.x > 0.0 && v.y == 0.0);
        assert_eq!(s.time().frame_count(), 1);
        assert_eq!(s.time().substep_count(), 8);
    }

    #[test]
    fn zero_dt_keeps_velocity_finite() {
        let mut s = solver(Vec2::splat(10.0), weightless());
        let id = s.create_object(Vec2::splat(5.0)).unwrap();
        s.object_mut(id).unwrap().add_velocity(Vec2::new(0.01, 0.0));
        s.update(TICK_DT);
        let before = s.velocity_of(id).unwrap();

        s.update(0.0);
        let v = s.velocity_of(id).unwrap();
        assert!(v.is_finite(), "{v}");
        assert!(v.x > 0.0 && v.x <= before.x);
    }

    #[test]
    fn final_boundary_pass_is_profiled() {
        let mut s = solver(Vec2::splat(10.0), SolverConfig::default());
        s.create_object(Vec2::splat(5.0)).unwrap();
        s.update(TICK_DT);
        let expected = if verlet_metrics::ENABLED { 8 + 1 } else { 0 };
        assert_eq!(s.profiler().get_timing(phase::BOUNDARY).calls, expected);
        assert_eq!(
            s.profiler().get_timing(phase::INTEGRATION).calls,
            if verlet_metrics::ENABLED { 8 } else { 0 }
        );
    }

    #[test]
    fn gravity_field_is_applied() {
        let mut s = solver(Vec2::splat(10.0), weightless());
        let id = s.create_object(Vec2::splat(5.0)).unwrap();
        s.update(TICK_DT);
        assert_eq!(s.object(id).unwrap().position, Vec2::splat(5.0));
        s.gravity = Vec2::new(0.0, 20.0);
        s.update(TICK_DT);
        assert!(s.object(id).unwrap().position.y > 5.0);
    }

    #[test]
    fn falling_particle_settles_on_the_floor() {
        let mut s = solver(Vec2::splat(10.0), SolverConfig::default());
        let id = s.create_object(Vec2::splat(5.0)).unwrap();
        for _ in 0..600 {
            s.update(TICK_DT);
        }
        let p = s.object(id).unwrap();
        assert!((p.position.y - 9.5).abs() < 1e-3, "y = {}", p.position.y);
        assert!((p.position.x - 5.0).abs() < 1e-6);
        assert!(p.displacement().length() < 1e-3);
    }

    #[test]
    fn resting_lattice_is_stable() {
        let pool = Arc::new(WorkerPool::new(4).unwrap());
        let mut s = Solver::with_config(Vec2::splat(120.0), pool, weightless()).unwrap();
        let mut rng = DeterministicRng::new(7);
        let mut start = Vec::with_capacity(10_000);
        for i in 0..100 {
            for j in 0..100 {
                let jitter = Vec2::new(rng.range_f32(-0.04, 0.04), rng.range_f32(-0.04, 0.04));
                let position = Vec2::new(5.0 + 1.1 * i as f32, 5.0 + 1.1 * j as f32) + jitter;
                start.push((s.create_object(position).unwrap(), position));
            }
        }

        for _ in 0..60 {
            s.update(TICK_DT);
        }

        assert_eq!(s.object_count(), 10_000);
        assert_eq!(s.last_contact_count(), 0);
        for (id, position) in start {
            assert!((s.object(id).unwrap().position - position).length() < 1e-4);
        }
    }

    #[test]
    fn overlapping_cluster_relaxes_apart() {
        let config = SolverConfig {
            air_friction: 1e7,
            ..weightless()
        };
        let mut s = solver(Vec2::splat(40.0), config);
        let mut rng = DeterministicRng::new(11);
        for _ in 0..100 {
            let position = Vec2::new(rng.range_f32(10.0, 30.0), rng.range_f32(10.0, 30.0));
            s.create_object(position).unwrap();
        }
        for _ in 0..60 {
            s.update(TICK_DT);
        }

        let positions: Vec<Vec2> = s.objects().iter().map(|(_, p)| p.position).collect();
        let mut min = f32::MAX;
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                min = min.min(a.distance(*b));
            }
        }
        assert!(min >= 1.0 - 1e-3, "closest pair {min}");
    }

    #[test]
    fn fast_particles_stay_inside_the_domain() {
        let mut s = solver(Vec2::splat(20.0), SolverConfig::default());
        let launches = [
            Vec2::new(3.0, 0.0),
            Vec2::new(-3.0, 0.0),
            Vec2::new(0.0, -3.0),
            Vec2::new(2.0, 2.0),
        ];
        for (i, launch) in launches.into_iter().enumerate() {
            let id = s.create_object(Vec2::new(6.0 + 2.0 * i as f32, 10.0)).unwrap();
            s.object_mut(id).unwrap().add_velocity(launch);
        }
        for _ in 0..120 {
            s.update(TICK_DT);
            for (_, p) in s.objects().iter() {
                assert!(p.position.cmpge(Vec2::splat(p.radius)).all(), "{}", p.position);
                assert!(p.position.cmple(s.domain() - p.radius).all(), "{}", p.position);
            }
        }
    }

    #[test]
    fn ids_keep_pointing_at_their_particle() {
        let mut s = solver(Vec2::splat(30.0), SolverConfig::default());
        let ids: Vec<_> = (0..50)
            .map(|i| {
                let id = s
                    .create_object(Vec2::new(2.0 + (i % 10) as f32 * 2.5, 2.0 + (i / 10) as f32 * 2.5))
                    .unwrap();
                s.object_mut(id).unwrap().color = rainbow(i as f32 * 0.02);
                id
            })
            .collect();
        for _ in 0..30 {
            s.update(TICK_DT);
        }
        for (i, id) in ids.into_iter().enumerate() {
            assert_eq!(id.index(), i);
            assert_eq!(s.object(id).unwrap().color, rainbow(i as f32 * 0.02));
        }
    }
}
