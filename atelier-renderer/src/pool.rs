//! Primitive pool for grid rendering.
//!
//! Grid primitives live in a slot arena addressed by generational
//! [`PrimitiveHandle`]s. Primitives not needed in a frame are hidden and
//! parked in a bounded FIFO so the next frame can reuse them; anything beyond
//! the FIFO's capacity is released and its slot index goes onto a free
//! stack.
//!
//! ```text
//!            acquire                      retire
//!   pooled ───────────▶ live ───────────────────────▶ pooled (room left)
//!   vacant ───────────▶ live                   └────▶ vacant (pool full)
//! ```
//!
//! A handle records the generation of the slot it was issued for. Retiring or
//! releasing bumps the generation, so stale handles resolve to `None` instead
//! of aliasing a recycled primitive. Slots dropped by a cleanup or teardown
//! raise a generation floor that regrown slots start from, so the same holds
//! after the arena shrinks.

use std::collections::VecDeque;

use atelier_core::WorldPoint;
use serde::{Deserialize, Serialize};

/// Classification of a grid primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// Every fifth grid line (and the axes).
    Major,
    /// Remaining grid lines.
    Minor,
    /// Grid intersection dot.
    Dot,
}

/// Geometry of a grid primitive in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum PrimitiveGeometry {
    /// A line segment.
    Line {
        /// Start point.
        from: WorldPoint,
        /// End point.
        to: WorldPoint,
    },
    /// A filled dot.
    Dot {
        /// Center.
        center: WorldPoint,
        /// Radius in screen pixels.
        radius: f64,
    },
}

/// A pooled drawable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPrimitive {
    /// Stable identity, kept across recycling.
    pub id: u64,
    /// Classification.
    pub kind: PrimitiveKind,
    /// Geometry.
    pub geometry: PrimitiveGeometry,
    /// Style generation the primitive was last drawn with.
    pub style_version: u32,
    /// Whether the host should draw it.
    pub visible: bool,
}

/// Generational index into the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveHandle {
    index: u32,
    generation: u32,
}

impl PrimitiveHandle {
    /// Slot index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }
}

/// Pool limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Retired primitives kept for reuse.
    pub capacity: usize,
    /// Pool size above which a cleanup is forced.
    ///
    /// The FIFO never holds more than `capacity`, so this limit only has an
    /// effect when it is below `capacity`.
    pub max_pool_size: usize,
    /// Live plus pooled primitives above which a cleanup is forced.
    pub max_drawables: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            max_pool_size: 1000,
            max_drawables: 5000,
        }
    }
}

/// Pool counters for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Primitives created in a vacant or new slot.
    pub allocated: u64,
    /// Primitives taken from the FIFO.
    pub recycled: u64,
    /// Primitives released (slot vacated).
    pub released: u64,
    /// Forced cleanups.
    pub cleanups: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Vacant,
    Live,
    Pooled,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    state: SlotState,
    primitive: GridPrimitive,
}

/// Arena of grid primitives with a bounded reuse FIFO.
#[derive(Debug, Clone, Default)]
pub struct PrimitivePool {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    pooled: VecDeque<u32>,
    live: usize,
    next_id: u64,
    generation_floor: u32,
    config: PoolConfig,
    stats: PoolStats,
}

impl PrimitivePool {
    /// Create a pool with the given limits.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Pool limits.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Pool counters.
    #[must_use]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Primitives handed out and not retired.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Hidden primitives waiting for reuse.
    #[must_use]
    pub fn pooled_count(&self) -> usize {
        self.pooled.len()
    }

    /// Live plus pooled primitives.
    #[must_use]
    pub fn drawable_count(&self) -> usize {
        self.live + self.pooled.len()
    }

    /// Take a primitive, preferring the FIFO over a fresh allocation.
    pub fn acquire(
        &mut self,
        kind: PrimitiveKind,
        geometry: PrimitiveGeometry,
        style_version: u32,
    ) -> PrimitiveHandle {
        if let Some(index) = self.pooled.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.state = SlotState::Live;
            slot.primitive.kind = kind;
            slot.primitive.geometry = geometry;
            slot.primitive.style_version = style_version;
            slot.primitive.visible = true;
            self.live += 1;
            self.stats.recycled += 1;
            return PrimitiveHandle {
                index,
                generation: slot.generation,
            };
        }

        let primitive = GridPrimitive {
            id: self.next_id,
            kind,
            geometry,
            style_version,
            visible: true,
        };
        self.next_id += 1;
        self.live += 1;
        self.stats.allocated += 1;

        if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            slot.state = SlotState::Live;
            slot.primitive = primitive;
            return PrimitiveHandle {
                index,
                generation: slot.generation,
            };
        }

        #[allow(clippy::cast_possible_truncation)]
        let index = self.slots.len() as u32;
        let generation = self.generation_floor;
        self.slots.push(Slot {
            generation,
            state: SlotState::Live,
            primitive,
        });
        PrimitiveHandle { index, generation }
    }

    /// Rewrite a live primitive in place. Returns `false` for stale handles.
    pub fn update(
        &mut self,
        handle: PrimitiveHandle,
        kind: PrimitiveKind,
        geometry: PrimitiveGeometry,
        style_version: u32,
    ) -> bool {
        let Some(primitive) = self.get_mut(handle) else {
            return false;
        };
        primitive.kind = kind;
        primitive.geometry = geometry;
        primitive.style_version = style_version;
        primitive.visible = true;
        true
    }

    /// Hide a live primitive and park it for reuse, or release it when the
    /// FIFO is full. Stale handles are ignored.
    pub fn retire(&mut self, handle: PrimitiveHandle) {
        let Some(slot) = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.state == SlotState::Live && s.generation == handle.generation)
        else {
            return;
        };
        slot.primitive.visible = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;

        if self.pooled.len() < self.config.capacity {
            slot.state = SlotState::Pooled;
            self.pooled.push_back(handle.index);
        } else {
            slot.state = SlotState::Vacant;
            self.vacant.push(handle.index);
            self.stats.released += 1;
        }
    }

    /// Look up a live primitive.
    #[must_use]
    pub fn get(&self, handle: PrimitiveHandle) -> Option<&GridPrimitive> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.state == SlotState::Live && s.generation == handle.generation)
            .map(|s| &s.primitive)
    }

    /// Look up a live primitive mutably.
    pub fn get_mut(&mut self, handle: PrimitiveHandle) -> Option<&mut GridPrimitive> {
        self.live_slot_mut(handle).map(|s| &mut s.primitive)
    }

    /// Live primitives the host should draw.
    pub fn visible(&self) -> impl Iterator<Item = &GridPrimitive> {
        self.slots
            .iter()
            .filter(|s| s.state == SlotState::Live && s.primitive.visible)
            .map(|s| &s.primitive)
    }

    /// Whether a forced cleanup is due.
    ///
    /// With the default limits only `max_drawables` can trip this; see
    /// [`PoolConfig::max_pool_size`].
    #[must_use]
    pub fn under_pressure(&self) -> bool {
        self.pooled.len() > self.config.max_pool_size
            || self.drawable_count() > self.config.max_drawables
    }

    /// Release every pooled primitive and trim trailing vacant slots.
    ///
    /// Returns the number of primitives released.
    pub fn cleanup(&mut self) -> usize {
        let released = self.pooled.len();
        while let Some(index) = self.pooled.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.state = SlotState::Vacant;
            slot.generation = slot.generation.wrapping_add(1);
            self.vacant.push(index);
        }
        while self
            .slots
            .last()
            .is_some_and(|s| s.state == SlotState::Vacant)
        {
            if let Some(slot) = self.slots.pop() {
                self.generation_floor = self.generation_floor.max(slot.generation);
            }
        }
        let len = self.slots.len();
        self.vacant.retain(|&i| (i as usize) < len);

        self.stats.released += released as u64;
        self.stats.cleanups += 1;
        tracing::debug!(
            "Primitive pool cleanup: released {released}, {} slots remain",
            self.slots.len()
        );
        released
    }

    /// Release everything, live primitives included (teardown).
    pub fn release_all(&mut self) {
        let released = self.drawable_count();
        for slot in self.slots.drain(..) {
            self.generation_floor = self.generation_floor.max(slot.generation.wrapping_add(1));
        }
        self.vacant.clear();
        self.pooled.clear();
        self.live = 0;
        self.stats.released += released as u64;
        tracing::debug!("Primitive pool released {released} primitives");
    }

    fn live_slot_mut(&mut self, handle: PrimitiveHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.state == SlotState::Live && s.generation == handle.generation)
    }
}
