//! Per-flow compression contexts and their fixed-capacity store.
//!
//! The store is a dense array indexed by CID, sized `MAX_CID + 1` at
//! construction. Allocation prefers the lowest unused slot; when every slot
//! is in use the least recently used context is recycled. Lookup walks the
//! used slots comparing `(profile, key)` first and confirms candidates with
//! the profile's content match, stopping early once every used context has
//! been visited.

use std::collections::VecDeque;
use std::time::Instant;

use crate::error::CompressionError;
use crate::headers::PacketHeaders;
use crate::profiles::{PacketType, ProfileHandler, RohcProfile};
use crate::profiles::rfc3095::Rfc3095Context;
use crate::types::{ContextId, ContextKey};

/// Compressor states of RFC 3095 §4.3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    /// Initialization & Refresh: full static + dynamic context is sent.
    #[default]
    Ir,
    /// First Order: partial updates.
    Fo,
    /// Second Order: minimal updates.
    So,
}

impl ContextState {
    /// Textual description of the state ("IR", "FO", "SO").
    pub fn descr(self) -> &'static str {
        match self {
            ContextState::Ir => "IR",
            ContextState::Fo => "FO",
            ContextState::So => "SO",
        }
    }
}

/// Operating modes of RFC 3095 §4.4. Only U-mode is produced by this
/// compressor; O and R exist for feedback bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RohcMode {
    #[default]
    Unidirectional,
    BidirectionalOptimistic,
    BidirectionalReliable,
}

impl RohcMode {
    /// Textual description of the mode ("U", "O", "R").
    pub fn descr(self) -> &'static str {
        match self {
            RohcMode::Unidirectional => "U",
            RohcMode::BidirectionalOptimistic => "O",
            RohcMode::BidirectionalReliable => "R",
        }
    }
}

/// Profile-owned block of a context.
///
/// The RFC 3095 family of profiles (IP-only, UDP, UDP-Lite, ESP, RTP) all
/// build on the same generic block; the Uncompressed profile needs none.
#[derive(Debug, Clone)]
pub enum ProfileContext {
    Rfc3095(Box<Rfc3095Context>),
    Uncompressed,
}

impl ProfileContext {
    /// The generic RFC 3095 block, when this context has one.
    pub fn rfc3095(&self) -> Option<&Rfc3095Context> {
        match self {
            ProfileContext::Rfc3095(ctx) => Some(ctx),
            ProfileContext::Uncompressed => None,
        }
    }

    /// Mutable access to the generic RFC 3095 block.
    pub fn rfc3095_mut(&mut self) -> Option<&mut Rfc3095Context> {
        match self {
            ProfileContext::Rfc3095(ctx) => Some(ctx),
            ProfileContext::Uncompressed => None,
        }
    }
}

/// Sliding window over the sizes of the last 16 packets, for statistics.
#[derive(Debug, Clone, Default)]
pub struct SlidingStat {
    values: VecDeque<u32>,
}

impl SlidingStat {
    const WINDOW: usize = 16;

    /// Records one observation, evicting the oldest past 16 entries.
    pub fn add(&mut self, value: u32) {
        if self.values.len() == Self::WINDOW {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Sum of the stored observations.
    pub fn sum(&self) -> u64 {
        self.values.iter().map(|&v| u64::from(v)).sum()
    }

    /// Mean of the stored observations (0 when empty).
    pub fn mean(&self) -> u32 {
        if self.values.is_empty() {
            0
        } else {
            (self.sum() / self.values.len() as u64) as u32
        }
    }
}

/// Counters a context accumulates over its lifetime.
#[derive(Debug, Clone, Default)]
pub struct ContextStats {
    pub total_uncompressed_size: u64,
    pub total_compressed_size: u64,
    pub header_uncompressed_size: u64,
    pub header_compressed_size: u64,
    pub last_uncompressed_size: usize,
    pub last_compressed_size: usize,
    pub last_header_uncompressed_size: usize,
    pub last_header_compressed_size: usize,
    pub num_sent_packets: u64,
    pub num_sent_ir: u64,
    pub num_sent_ir_dyn: u64,
    pub num_recv_feedbacks: u64,
    pub total_16_uncompressed: SlidingStat,
    pub total_16_compressed: SlidingStat,
    pub header_16_uncompressed: SlidingStat,
    pub header_16_compressed: SlidingStat,
}

/// One active compression flow.
#[derive(Debug)]
pub struct CompressorContext {
    pub cid: ContextId,
    pub profile: RohcProfile,
    pub key: ContextKey,
    pub state: ContextState,
    pub mode: RohcMode,
    /// Monotonic use tick assigned by the store; orders LRU eviction.
    pub latest_used_tick: u64,
    /// Wall-clock times, when the caller supplies arrival times.
    pub first_used: Option<Instant>,
    pub latest_used: Option<Instant>,
    pub packet_type: PacketType,
    pub stats: ContextStats,
    pub data: ProfileContext,
}

impl CompressorContext {
    fn new(cid: ContextId, profile: RohcProfile, key: ContextKey, data: ProfileContext) -> Self {
        Self {
            cid,
            profile,
            key,
            state: ContextState::Ir,
            mode: RohcMode::Unidirectional,
            latest_used_tick: 0,
            first_used: None,
            latest_used: None,
            packet_type: PacketType::Ir,
            stats: ContextStats::default(),
            data,
        }
    }
}

/// Fixed-capacity array of contexts indexed by CID.
#[derive(Debug)]
pub struct ContextStore {
    slots: Vec<Option<CompressorContext>>,
    num_used: usize,
    tick: u64,
}

impl ContextStore {
    /// Creates a store with room for `max_cid + 1` contexts.
    pub fn new(max_cid: ContextId) -> Self {
        let capacity = usize::from(max_cid.value()) + 1;
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            num_used: 0,
            tick: 0,
        }
    }

    /// Number of contexts currently in use.
    pub fn num_used(&self) -> usize {
        self.num_used
    }

    /// Capacity of the store (`MAX_CID + 1`).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Context for `cid`, when that CID is in use.
    pub fn get(&self, cid: ContextId) -> Option<&CompressorContext> {
        self.slots.get(usize::from(cid.value()))?.as_ref()
    }

    /// Mutable context for `cid`, when that CID is in use.
    pub fn get_mut(&mut self, cid: ContextId) -> Option<&mut CompressorContext> {
        self.slots.get_mut(usize::from(cid.value()))?.as_mut()
    }

    /// Iterates over the used contexts.
    pub fn iter(&self) -> impl Iterator<Item = &CompressorContext> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Iterates mutably over the used contexts.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CompressorContext> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Searches for the context matching `(profile, key)` and the profile's
    /// content check. Linear over used slots, stopping once every used
    /// context has been visited.
    pub fn find(
        &self,
        handler: &dyn ProfileHandler,
        key: ContextKey,
        packet: &[u8],
        headers: &PacketHeaders,
    ) -> Option<ContextId> {
        let mut used_seen = 0;
        for ctx in self.slots.iter().filter_map(Option::as_ref) {
            used_seen += 1;
            if ctx.profile == handler.profile_id()
                && ctx.key == key
                && handler.matches_context(&ctx.data, packet, headers)
            {
                return Some(ctx.cid);
            }
            if used_seen >= self.num_used {
                break;
            }
        }
        None
    }

    /// Allocates a context for a new flow.
    ///
    /// Picks the lowest unused slot, or recycles the least recently used
    /// context when the array is full.
    pub fn create(
        &mut self,
        profile: RohcProfile,
        key: ContextKey,
        data: ProfileContext,
        arrival_time: Option<Instant>,
    ) -> Result<ContextId, CompressionError> {
        let slot = if self.num_used == self.slots.len() {
            // All slots used: evict the oldest context.
            let victim = self
                .slots
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_ref().map(|c| (i, c.latest_used_tick)))
                .min_by_key(|&(_, tick)| tick)
                .map(|(i, _)| i)
                .ok_or(CompressionError::ContextsExhausted {
                    capacity: self.slots.len(),
                })?;
            log::debug!("recycle oldest context (CID = {})", victim);
            self.slots[victim] = None;
            self.num_used -= 1;
            victim
        } else {
            self.slots
                .iter()
                .position(Option::is_none)
                .ok_or(CompressionError::ContextsExhausted {
                    capacity: self.slots.len(),
                })?
        };

        let cid = ContextId::new(slot as u16);
        let mut context = CompressorContext::new(cid, profile, key, data);
        self.tick += 1;
        context.latest_used_tick = self.tick;
        context.first_used = arrival_time;
        context.latest_used = arrival_time;
        self.slots[slot] = Some(context);
        self.num_used += 1;
        log::debug!("context CID = {} created (num_used = {})", cid, self.num_used);
        Ok(cid)
    }

    /// Marks `cid` as just used, for LRU ordering.
    pub fn touch(&mut self, cid: ContextId, arrival_time: Option<Instant>) {
        self.tick += 1;
        let tick = self.tick;
        if let Some(ctx) = self.get_mut(cid) {
            ctx.latest_used_tick = tick;
            if arrival_time.is_some() {
                ctx.latest_used = arrival_time;
                if ctx.first_used.is_none() {
                    ctx.first_used = arrival_time;
                }
            }
        }
    }

    /// Destroys the context for `cid`, freeing the slot.
    pub fn destroy(&mut self, cid: ContextId) {
        if let Some(slot) = self.slots.get_mut(usize::from(cid.value())) {
            if slot.take().is_some() {
                self.num_used -= 1;
            }
        }
    }

    /// Destroys every context for which `predicate` returns true.
    pub fn destroy_where(&mut self, mut predicate: impl FnMut(&CompressorContext) -> bool) {
        for slot in &mut self.slots {
            if let Some(ctx) = slot {
                if predicate(ctx) {
                    log::debug!("destroy context CID = {}", ctx.cid);
                    *slot = None;
                    self.num_used -= 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_contexts(capacity: u16, n: u16) -> ContextStore {
        let mut store = ContextStore::new(ContextId::new(capacity - 1));
        for i in 0..n {
            let cid = store
                .create(
                    RohcProfile::Ip,
                    ContextKey::new(u32::from(i)),
                    ProfileContext::Uncompressed,
                    None,
                )
                .unwrap();
            assert_eq!(cid, i);
        }
        store
    }

    #[test]
    fn lowest_unused_slot_is_preferred() {
        let mut store = store_with_contexts(4, 3);
        store.destroy(ContextId::new(1));
        let cid = store
            .create(
                RohcProfile::Ip,
                ContextKey::new(99),
                ProfileContext::Uncompressed,
                None,
            )
            .unwrap();
        assert_eq!(cid, 1, "freed slot 1 should be reused before slot 3");
        assert_eq!(store.num_used(), 3);
    }

    #[test]
    fn full_store_recycles_least_recently_used() {
        let mut store = store_with_contexts(3, 3);
        // Touch CIDs 0 and 2 so CID 1 becomes the oldest.
        store.touch(ContextId::new(0), None);
        store.touch(ContextId::new(2), None);
        let cid = store
            .create(
                RohcProfile::Udp,
                ContextKey::new(50),
                ProfileContext::Uncompressed,
                None,
            )
            .unwrap();
        assert_eq!(cid, 1, "LRU context should be recycled");
        assert_eq!(store.num_used(), 3);
        assert_eq!(store.get(ContextId::new(1)).unwrap().profile, RohcProfile::Udp);
    }

    #[test]
    fn num_used_tracks_slots() {
        let mut store = store_with_contexts(8, 5);
        assert_eq!(store.num_used(), 5);
        assert_eq!(store.iter().count(), 5);
        store.destroy(ContextId::new(0));
        store.destroy(ContextId::new(4));
        assert_eq!(store.num_used(), 3);
        assert_eq!(store.iter().count(), 3);
    }

    #[test]
    fn destroy_where_removes_matching() {
        let mut store = store_with_contexts(8, 4);
        store.destroy_where(|ctx| ctx.key.value() % 2 == 0);
        assert_eq!(store.num_used(), 2);
        assert!(store.get(ContextId::new(0)).is_none());
        assert!(store.get(ContextId::new(1)).is_some());
    }

    #[test]
    fn sliding_stat_window_of_16() {
        let mut stat = SlidingStat::default();
        for i in 0..20u32 {
            stat.add(i);
        }
        // Entries 4..20 remain.
        assert_eq!(stat.sum(), (4..20).sum::<u32>() as u64);
        assert_eq!(stat.mean(), ((4..20).sum::<u32>() / 16) as u32);
    }

    #[test]
    fn state_and_mode_descriptions() {
        assert_eq!(ContextState::Ir.descr(), "IR");
        assert_eq!(ContextState::Fo.descr(), "FO");
        assert_eq!(ContextState::So.descr(), "SO");
        assert_eq!(RohcMode::Unidirectional.descr(), "U");
    }
}
