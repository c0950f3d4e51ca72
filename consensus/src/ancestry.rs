//! Ancestry queries over persisted DAG metadata.
//!
//! Every step reads [`UnitProps`] by id from the store; a walk holds only its
//! frontier and a visited set. Main-chain indexes give most answers without
//! walking at all:
//!
//! - a unit whose LIMCI is at least another unit's MCI includes that unit;
//! - every ancestor of a main-chain unit has an MCI, so walks never need to
//!   pass through main-chain units.

use std::collections::HashSet;

use tessera_store::UnitStore;
use tessera_types::{Address, Mci, UnitId, UnitProps};

use crate::ConsensusError;

/// Partial order between two units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitOrder {
    Equal,
    /// The first unit is an ancestor of the second.
    Before,
    /// The second unit is an ancestor of the first.
    After,
    /// Neither includes the other.
    Unordered,
}

impl UnitOrder {
    pub fn reverse(self) -> Self {
        match self {
            UnitOrder::Before => UnitOrder::After,
            UnitOrder::After => UnitOrder::Before,
            other => other,
        }
    }
}

pub(crate) fn load<S: UnitStore + ?Sized>(store: &S, unit: &UnitId) -> Result<UnitProps, ConsensusError> {
    store.unit_props(unit)?.ok_or(ConsensusError::MissingUnit(*unit))
}

pub(crate) fn parents_of<S: UnitStore + ?Sized>(
    store: &S,
    unit: &UnitId,
) -> Result<Vec<UnitId>, ConsensusError> {
    store
        .read_unit(unit)?
        .map(|u| u.parent_units)
        .ok_or(ConsensusError::MissingUnit(*unit))
}

/// Order two stored units.
pub fn compare<S: UnitStore + ?Sized>(
    store: &S,
    a: &UnitId,
    b: &UnitId,
) -> Result<UnitOrder, ConsensusError> {
    if a == b {
        return Ok(UnitOrder::Equal);
    }
    let pa = load(store, a)?;
    let pb = load(store, b)?;
    compare_props(store, &pa, &pb)
}

/// Order two units whose metadata is already loaded.
pub fn compare_props<S: UnitStore + ?Sized>(
    store: &S,
    a: &UnitProps,
    b: &UnitProps,
) -> Result<UnitOrder, ConsensusError> {
    if a.unit == b.unit {
        return Ok(UnitOrder::Equal);
    }
    if a.level == b.level {
        return Ok(UnitOrder::Unordered);
    }
    if a.is_free && b.is_free {
        return Ok(UnitOrder::Unordered);
    }
    if a.level == 0 {
        return Ok(UnitOrder::Before);
    }
    if b.level == 0 {
        return Ok(UnitOrder::After);
    }
    if includes_by_index(a, b) {
        return Ok(UnitOrder::After);
    }
    if includes_by_index(b, a) {
        return Ok(UnitOrder::Before);
    }

    let (earlier, later, if_found) = if a.level < b.level {
        (a, b, UnitOrder::Before)
    } else {
        (b, a, UnitOrder::After)
    };
    if !indexes_agree(earlier, later) {
        return Ok(UnitOrder::Unordered);
    }

    let found = if later.mc_gap() > earlier.mc_gap() {
        walk_down(store, earlier, later)?
    } else {
        walk_up(store, std::slice::from_ref(later), earlier)?
    };
    tracing::trace!(a = %a.unit, b = %b.unit, found, "ancestry walk");
    Ok(if found { if_found } else { UnitOrder::Unordered })
}

/// `later` includes the main-chain unit at its LIMCI, which in turn includes
/// every unit with a smaller or equal MCI.
fn includes_by_index(later: &UnitProps, earlier: &UnitProps) -> bool {
    matches!(
        (later.latest_included_mc_index, earlier.main_chain_index),
        (Some(limci), Some(mci)) if limci >= mci
    )
}

/// Level, LIMCI and MCI must not contradict `earlier` being an ancestor of `later`.
fn indexes_agree(earlier: &UnitProps, later: &UnitProps) -> bool {
    if earlier.level >= later.level {
        return false;
    }
    if earlier.latest_included_mc_index > later.latest_included_mc_index {
        return false;
    }
    match (earlier.main_chain_index, later.main_chain_index) {
        (Some(e), Some(l)) => e <= l,
        // A unit covered by the main chain has only covered ancestors.
        (None, Some(_)) => false,
        _ => true,
    }
}

/// Walk parents from `start` looking for `target`. Only off-chain units above
/// the target's level are expanded.
fn walk_up<S: UnitStore + ?Sized>(
    store: &S,
    start: &[UnitProps],
    target: &UnitProps,
) -> Result<bool, ConsensusError> {
    let mut visited: HashSet<UnitId> = HashSet::new();
    let mut frontier: Vec<UnitId> = start
        .iter()
        .filter(|p| p.level > target.level)
        .map(|p| p.unit)
        .collect();
    while let Some(unit) = frontier.pop() {
        for parent in parents_of(store, &unit)? {
            if parent == target.unit {
                return Ok(true);
            }
            if !visited.insert(parent) {
                continue;
            }
            let props = load(store, &parent)?;
            if !props.is_on_main_chain && props.level > target.level {
                frontier.push(parent);
            }
        }
    }
    Ok(false)
}

/// Walk children from `source` looking for `target`. Only off-chain units
/// below the target's level are expanded.
fn walk_down<S: UnitStore + ?Sized>(
    store: &S,
    source: &UnitProps,
    target: &UnitProps,
) -> Result<bool, ConsensusError> {
    let mut visited: HashSet<UnitId> = HashSet::new();
    let mut frontier = vec![source.unit];
    while let Some(unit) = frontier.pop() {
        for child in store.children(&unit)? {
            if child == target.unit {
                return Ok(true);
            }
            if !visited.insert(child) {
                continue;
            }
            let props = load(store, &child)?;
            if !props.is_on_main_chain && props.level < target.level {
                frontier.push(child);
            }
        }
    }
    Ok(false)
}

/// Whether `earlier` is a strict ancestor of any unit in `later`.
///
/// The root unit is included in every set.
pub fn is_included<S: UnitStore + ?Sized>(
    store: &S,
    earlier: &UnitId,
    later: &[UnitId],
) -> Result<bool, ConsensusError> {
    if later.is_empty() {
        return Ok(false);
    }
    let earlier_props = load(store, earlier)?;
    if earlier_props.level == 0 {
        return Ok(true);
    }
    if earlier_props.is_free && !later.contains(earlier) {
        return Ok(false);
    }

    let later_props = later
        .iter()
        .map(|u| load(store, u))
        .collect::<Result<Vec<_>, _>>()?;

    let max_limci = later_props
        .iter()
        .filter_map(|p| p.latest_included_mc_index)
        .max();
    if let (Some(mci), Some(limci)) = (earlier_props.main_chain_index, max_limci) {
        if mci <= limci {
            return Ok(true);
        }
    }

    let max_level = later_props.iter().map(|p| p.level).max().unwrap_or(0);
    if earlier_props.level > max_level {
        return Ok(false);
    }

    walk_up(store, &later_props, &earlier_props)
}

pub fn is_included_or_equal<S: UnitStore + ?Sized>(
    store: &S,
    earlier: &UnitId,
    later: &[UnitId],
) -> Result<bool, ConsensusError> {
    if later.contains(earlier) {
        return Ok(true);
    }
    is_included(store, earlier, later)
}

/// Descendants of `earlier` with an MCI of at most `to_mci` that are
/// authored by any of `authors`, ordered by `(level, unit)`.
pub fn descendants_by_authors_before_mci<S: UnitStore + ?Sized>(
    store: &S,
    earlier: &UnitId,
    authors: &[Address],
    to_mci: Mci,
) -> Result<Vec<UnitId>, ConsensusError> {
    load(store, earlier)?;
    let mut visited: HashSet<UnitId> = HashSet::new();
    let mut found = Vec::new();
    let mut frontier = vec![*earlier];
    while let Some(unit) = frontier.pop() {
        for child in store.children(&unit)? {
            if !visited.insert(child) {
                continue;
            }
            let props = load(store, &child)?;
            if props.main_chain_index.map_or(true, |m| m > to_mci) {
                continue;
            }
            let content = store
                .read_unit(&child)?
                .ok_or(ConsensusError::MissingUnit(child))?;
            if authors.iter().any(|a| content.is_authored_by(a)) {
                found.push((props.level, child));
            }
            frontier.push(child);
        }
    }
    found.sort();
    Ok(found.into_iter().map(|(_, u)| u).collect())
}
