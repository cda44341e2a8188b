//! # Occupancy Ledger
//!
//! In-process source of truth for every counter that needs strict mutual
//! exclusion. One `std::sync::Mutex` guards the whole state; every public
//! method is a single critical section with no await inside, so the ledger can
//! be shared freely between tasks and threads.
//!
//! Occupancy is never stored as a free-running counter. It is recounted from
//! a per-site index of the bookings currently in an occupying state, so the
//! cost of a recount does not grow with booking history.
//! `Site::current_occupancy` is refreshed from that recount after every
//! commit.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::models::{Booking, BookingStatus, CleanupEvent, EcoPointsOutcome, RegistrationOutcome, Site};
use crate::store::{validate_new_booking, validate_site, AdmissionGate, StoreError, TransitionOutcome};

#[derive(Default)]
struct LedgerState {
    sites: HashMap<String, Site>,
    bookings: HashMap<String, Booking>,
    /// site id -> booking id -> group size, for occupying bookings only.
    occupying: HashMap<String, HashMap<String, u32>>,
    events: HashMap<String, CleanupEvent>,
    registrations: HashSet<(String, String)>,
    points: HashMap<String, i64>,
}

fn recount(occupying: &HashMap<String, HashMap<String, u32>>, site_id: &str) -> u32 {
    occupying
        .get(site_id)
        .map_or(0, |groups| groups.values().fold(0u32, |acc, g| acc.saturating_add(*g)))
}

#[derive(Default)]
pub struct OccupancyLedger {
    state: Mutex<LedgerState>,
}

impl OccupancyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Inserts or replaces a site. The stored occupancy is always the recount,
    /// whatever the incoming value says.
    pub fn upsert_site(&self, mut site: Site) -> Result<(), StoreError> {
        validate_site(&site)?;
        let mut guard = self.lock()?;
        let state = &mut *guard;
        site.current_occupancy = recount(&state.occupying, &site.id);
        state.sites.insert(site.id.clone(), site);
        Ok(())
    }

    pub fn site(&self, site_id: &str) -> Result<Option<Site>, StoreError> {
        Ok(self.lock()?.sites.get(site_id).cloned())
    }

    /// All sites ordered by id.
    pub fn sites(&self) -> Result<Vec<Site>, StoreError> {
        let mut sites: Vec<Site> = self.lock()?.sites.values().cloned().collect();
        sites.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sites)
    }

    pub fn booking(&self, booking_id: &str) -> Result<Option<Booking>, StoreError> {
        Ok(self.lock()?.bookings.get(booking_id).cloned())
    }

    /// Stores a pending or terminal booking. Occupying statuses are refused
    /// with `GateRequired`; they are only reachable through `transition`.
    pub fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        validate_new_booking(&booking)?;
        let mut guard = self.lock()?;
        let state = &mut *guard;
        if !state.sites.contains_key(&booking.site_id) {
            return Err(StoreError::not_found("site", booking.site_id));
        }
        if let Some(previous) = state.bookings.insert(booking.id.clone(), booking) {
            if let Some(groups) = state.occupying.get_mut(&previous.site_id) {
                groups.remove(&previous.id);
            }
            let occupancy = recount(&state.occupying, &previous.site_id);
            if let Some(site) = state.sites.get_mut(&previous.site_id) {
                site.current_occupancy = occupancy;
            }
        }
        Ok(())
    }

    pub fn occupancy(&self, site_id: &str) -> Result<u32, StoreError> {
        let state = self.lock()?;
        if !state.sites.contains_key(site_id) {
            return Err(StoreError::not_found("site", site_id));
        }
        Ok(recount(&state.occupying, site_id))
    }

    /// Check-and-commit for a booking status change. The recount, the gate
    /// and the write all happen under one lock acquisition.
    pub fn transition(
        &self,
        booking_id: &str,
        next: BookingStatus,
        gate: Option<AdmissionGate<'_>>,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let current = state
            .bookings
            .get(booking_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("booking", booking_id))?;
        if !current.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition { from: current.status, to: next });
        }
        let site = state
            .sites
            .get(&current.site_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("site", current.site_id.clone()))?;

        if current.status.requires_admission(next) {
            let gate = gate.ok_or(StoreError::GateRequired(next))?;
            let occupancy = recount(&state.occupying, &site.id);
            let view = Site { current_occupancy: occupancy, ..site.clone() };
            let decision = gate(&view, occupancy);
            if !decision.allowed {
                return Ok(TransitionOutcome::Denied { booking: current, decision });
            }
        }

        let updated = match state.bookings.get_mut(booking_id) {
            Some(booking) => {
                booking.status = next;
                booking.updated_at = Utc::now();
                booking.clone()
            }
            None => return Err(StoreError::not_found("booking", booking_id)),
        };
        let groups = state.occupying.entry(site.id.clone()).or_default();
        if next.is_occupying() {
            groups.insert(updated.id.clone(), updated.group_size);
        } else {
            groups.remove(&updated.id);
        }
        let occupancy = recount(&state.occupying, &site.id);
        if let Some(stored) = state.sites.get_mut(&site.id) {
            stored.current_occupancy = occupancy;
        }
        Ok(TransitionOutcome::Committed { booking: updated, occupancy })
    }

    pub fn upsert_event(&self, event: CleanupEvent) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let registered = state.registrations.iter().filter(|(e, _)| *e == event.id).count() as u32;
        let event = CleanupEvent { current_participants: registered, ..event };
        state.events.insert(event.id.clone(), event);
        Ok(())
    }

    pub fn event(&self, event_id: &str) -> Result<Option<CleanupEvent>, StoreError> {
        Ok(self.lock()?.events.get(event_id).cloned())
    }

    pub fn register(&self, event_id: &str, user_id: &str) -> Result<RegistrationOutcome, StoreError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let event = state
            .events
            .get_mut(event_id)
            .ok_or_else(|| StoreError::not_found("cleanup event", event_id))?;
        let key = (event_id.to_string(), user_id.to_string());
        if state.registrations.contains(&key) {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }
        if event.current_participants >= event.max_participants {
            return Ok(RegistrationOutcome::Full { max_participants: event.max_participants });
        }
        event.current_participants += 1;
        let participants = event.current_participants;
        state.registrations.insert(key);
        Ok(RegistrationOutcome::Registered { participants })
    }

    pub fn cancel_registration(&self, event_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let key = (event_id.to_string(), user_id.to_string());
        if !state.registrations.remove(&key) {
            return Ok(false);
        }
        if let Some(event) = state.events.get_mut(event_id) {
            event.current_participants = event.current_participants.saturating_sub(1);
        }
        Ok(true)
    }

    pub fn adjust_points(&self, user_id: &str, delta: i64) -> Result<EcoPointsOutcome, StoreError> {
        let mut state = self.lock()?;
        let balance = state.points.entry(user_id.to_string()).or_insert(0);
        if delta < 0 && *balance < delta.saturating_neg() {
            return Ok(EcoPointsOutcome::InsufficientBalance {
                balance: *balance,
                requested: delta.saturating_neg(),
            });
        }
        *balance = balance.saturating_add(delta);
        Ok(EcoPointsOutcome::Applied { balance: *balance })
    }

    pub fn points(&self, user_id: &str) -> Result<i64, StoreError> {
        Ok(self.lock()?.points.get(user_id).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingDecision, SensitivityLevel};
    use std::sync::Arc;

    fn booking(id: &str, site: &str, group: u32, status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: id.into(),
            site_id: site.into(),
            user_id: "u1".into(),
            group_size: group,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    fn capped(cap: u32, group: u32) -> impl Fn(&Site, u32) -> BookingDecision + Send + Sync {
        move |_site, occupancy| {
            let available = cap.saturating_sub(occupancy);
            if group <= available {
                BookingDecision {
                    allowed: true,
                    reason: None,
                    adjusted_capacity: cap,
                    available_spots: available,
                    requires_permit: false,
                    requires_briefing: false,
                }
            } else {
                BookingDecision::deny(format!("only {} spots", available), cap, available)
            }
        }
    }

    fn ledger_with_site() -> OccupancyLedger {
        let ledger = OccupancyLedger::new();
        ledger.upsert_site(Site::new("s1", "Fern Gully", 100, SensitivityLevel::High)).unwrap();
        ledger
    }

    fn admit(ledger: &OccupancyLedger, id: &str, group: u32) {
        ledger.insert_booking(booking(id, "s1", group, BookingStatus::Pending)).unwrap();
        let gate = capped(100, group);
        let outcome = ledger.transition(id, BookingStatus::Approved, Some(&gate)).unwrap();
        assert!(matches!(outcome, TransitionOutcome::Committed { .. }));
    }

    #[test]
    fn occupancy_counts_only_occupying_states() {
        let ledger = ledger_with_site();
        admit(&ledger, "b1", 4);
        admit(&ledger, "b2", 3);
        ledger.transition("b2", BookingStatus::CheckedIn, None).unwrap();
        ledger.insert_booking(booking("b3", "s1", 9, BookingStatus::Pending)).unwrap();
        ledger.insert_booking(booking("b4", "s1", 9, BookingStatus::Cancelled)).unwrap();
        assert_eq!(ledger.occupancy("s1").unwrap(), 7);
        assert_eq!(ledger.site("s1").unwrap().unwrap().current_occupancy, 7);
    }

    #[test]
    fn occupying_insert_is_refused() {
        let ledger = OccupancyLedger::new();
        ledger.upsert_site(Site::new("s1", "Sea Cave", 100, SensitivityLevel::Critical)).unwrap();
        for status in [BookingStatus::Approved, BookingStatus::CheckedIn] {
            assert!(matches!(
                ledger.insert_booking(booking("b1", "s1", 90, status)),
                Err(StoreError::GateRequired(s)) if s == status
            ));
        }
        assert!(ledger.booking("b1").unwrap().is_none());
        assert_eq!(ledger.occupancy("s1").unwrap(), 0);
    }

    #[test]
    fn zero_capacity_site_is_refused() {
        let ledger = OccupancyLedger::new();
        assert!(matches!(
            ledger.upsert_site(Site::new("s0", "Nowhere", 0, SensitivityLevel::Low)),
            Err(StoreError::InvalidSite { .. })
        ));
        assert!(ledger.site("s0").unwrap().is_none());
    }

    #[test]
    fn finished_bookings_leave_the_occupancy_index() {
        let ledger = ledger_with_site();
        for i in 0..50 {
            let id = format!("b{}", i);
            admit(&ledger, &id, 2);
            ledger.transition(&id, BookingStatus::CheckedIn, None).unwrap();
            ledger.transition(&id, BookingStatus::CheckedOut, None).unwrap();
        }
        admit(&ledger, "live", 6);
        assert_eq!(ledger.occupancy("s1").unwrap(), 6);
        let state = ledger.lock().unwrap();
        assert_eq!(state.occupying.get("s1").map(|g| g.len()), Some(1));
    }

    #[test]
    fn gate_denial_leaves_booking_untouched() {
        let ledger = ledger_with_site();
        admit(&ledger, "b1", 48);
        ledger.insert_booking(booking("b2", "s1", 5, BookingStatus::Pending)).unwrap();
        let gate = capped(50, 5);
        let outcome = ledger.transition("b2", BookingStatus::Approved, Some(&gate)).unwrap();
        assert!(matches!(outcome, TransitionOutcome::Denied { .. }));
        assert_eq!(ledger.booking("b2").unwrap().unwrap().status, BookingStatus::Pending);
        assert_eq!(ledger.occupancy("s1").unwrap(), 48);
    }

    #[test]
    fn leaving_occupancy_needs_no_gate() {
        let ledger = ledger_with_site();
        admit(&ledger, "b1", 10);
        ledger.transition("b1", BookingStatus::CheckedIn, None).unwrap();
        let outcome = ledger.transition("b1", BookingStatus::CheckedOut, None).unwrap();
        assert!(matches!(outcome, TransitionOutcome::Committed { occupancy: 0, .. }));
    }

    #[test]
    fn entering_occupancy_without_gate_is_an_error() {
        let ledger = ledger_with_site();
        ledger.insert_booking(booking("b1", "s1", 1, BookingStatus::Pending)).unwrap();
        assert!(matches!(
            ledger.transition("b1", BookingStatus::Approved, None),
            Err(StoreError::GateRequired(BookingStatus::Approved))
        ));
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let ledger = ledger_with_site();
        ledger.insert_booking(booking("b1", "s1", 1, BookingStatus::Cancelled)).unwrap();
        assert!(matches!(
            ledger.transition("b1", BookingStatus::Approved, None),
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn racing_threads_never_exceed_capacity() {
        let ledger = Arc::new(ledger_with_site());
        for i in 0..32 {
            ledger.insert_booking(booking(&format!("b{}", i), "s1", 4, BookingStatus::Pending)).unwrap();
        }
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    let gate = capped(50, 4);
                    matches!(
                        ledger.transition(&format!("b{}", i), BookingStatus::Approved, Some(&gate)),
                        Ok(TransitionOutcome::Committed { .. })
                    )
                })
            })
            .collect();
        let admitted = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(admitted, 12);
        assert_eq!(ledger.occupancy("s1").unwrap(), 48);
    }

    #[test]
    fn registration_respects_cap_and_duplicates() {
        let ledger = OccupancyLedger::new();
        ledger
            .upsert_event(CleanupEvent {
                id: "e1".into(),
                site_id: "s1".into(),
                title: "Beach sweep".into(),
                max_participants: 1,
                current_participants: 0,
                starts_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(ledger.register("e1", "u1").unwrap(), RegistrationOutcome::Registered { participants: 1 });
        assert_eq!(ledger.register("e1", "u1").unwrap(), RegistrationOutcome::AlreadyRegistered);
        assert_eq!(ledger.register("e1", "u2").unwrap(), RegistrationOutcome::Full { max_participants: 1 });
        assert!(ledger.cancel_registration("e1", "u1").unwrap());
        assert!(!ledger.cancel_registration("e1", "u1").unwrap());
        assert_eq!(ledger.event("e1").unwrap().unwrap().current_participants, 0);
    }

    #[test]
    fn redeem_beyond_balance_is_refused() {
        let ledger = OccupancyLedger::new();
        assert_eq!(ledger.adjust_points("u1", 30).unwrap(), EcoPointsOutcome::Applied { balance: 30 });
        assert_eq!(
            ledger.adjust_points("u1", -50).unwrap(),
            EcoPointsOutcome::InsufficientBalance { balance: 30, requested: 50 }
        );
        assert_eq!(ledger.adjust_points("u1", -30).unwrap(), EcoPointsOutcome::Applied { balance: 0 });
    }
}
