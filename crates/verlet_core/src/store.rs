use crate::math::Vec2;
use crate::particle::{Particle, ParticleId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("particle store is full ({capacity} particles)")]
    CapacityExhausted { capacity: usize },

    #[error("could not reserve storage for {capacity} particles")]
    Allocation { capacity: usize },

    #[error("particle {id} does not exist")]
    UnknownParticle { id: ParticleId },
}

/// Contiguous arena of particles indexed by [`ParticleId`].
///
/// Slots are never moved. Removed slots stay in place (marked dead) and are
/// only handed out again after [`ParticleStore::recycle`], which the solver
/// calls between frames, never while a job batch is in flight.
#[derive(Debug, Default)]
pub struct ParticleStore {
    slots: Vec<Particle>,
    capacity: Option<usize>,
    live: usize,
    free: Vec<ParticleId>,
    pending_free: Vec<ParticleId>,
}

impl ParticleStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding at most `capacity` particles. The memory is reserved up
    /// front so an impossible capacity fails here and not mid-simulation.
    pub fn with_capacity(capacity: usize) -> Result<Self, StoreError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| StoreError::Allocation { capacity })?;
        Ok(Self {
            slots,
            capacity: Some(capacity),
            ..Self::default()
        })
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Live particle count.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots, dead ones included. Ids are always below this.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether [`create`](Self::create) would fail. Removed slots count as
    /// occupied until the next [`recycle`](Self::recycle).
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| {
            self.live >= cap || (self.free.is_empty() && self.slots.len() >= cap)
        })
    }

    /// Append a particle at rest at `position`.
    pub fn create(&mut self, position: Vec2, radius: f32) -> Result<ParticleId, StoreError> {
        if let Some(capacity) = self.capacity {
            if self.is_full() {
                return Err(StoreError::CapacityExhausted { capacity });
            }
        }
        let particle = Particle::new(position, radius);
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id.index()] = particle;
                id
            }
            None => {
                let id = ParticleId::new(self.slots.len() as u32);
                self.slots.push(particle);
                id
            }
        };
        self.live += 1;
        Ok(id)
    }

    /// Kill a particle. Its id becomes reusable after the next
    /// [`recycle`](Self::recycle).
    pub fn remove(&mut self, id: ParticleId) -> Result<(), StoreError> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|p| p.alive)
            .ok_or(StoreError::UnknownParticle { id })?;
        slot.alive = false;
        self.live -= 1;
        self.pending_free.push(id);
        Ok(())
    }

    /// Release ids removed since the last call. Only call between frames.
    pub fn recycle(&mut self) -> usize {
        let released = self.pending_free.len();
        self.free.append(&mut self.pending_free);
        released
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.slots.get(id.index()).filter(|p| p.alive)
    }

    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.slots.get_mut(id.index()).filter(|p| p.alive)
    }

    /// Live particles with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ParticleId, &Particle)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, p)| p.alive)
            .map(|(i, p)| (ParticleId::new(i as u32), p))
    }

    /// Every slot, dead ones included (check [`Particle::is_alive`]).
    #[inline]
    pub fn as_slice(&self) -> &[Particle] {
        &self.slots
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.slots
    }
}

impl std::ops::Index<ParticleId> for ParticleStore {
    type Output = Particle;

    fn index(&self, id: ParticleId) -> &Particle {
        &self.slots[id.index()]
    }
}

impl std::ops::IndexMut<ParticleId> for ParticleStore {
    fn index_mut(&mut self, id: ParticleId) -> &mut Particle {
        &mut self.slots[id.index()]
    }
}
