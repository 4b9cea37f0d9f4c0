//! Menu position planning.
//!
//! Every function takes the current `(id, position)` slots and returns the
//! position writes needed to reach the next dense state. Nothing here
//! touches the database.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Menu operation errors.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("menu item not found")]
    NotFound,

    #[error("menu item is already at the top")]
    AlreadyAtTop,

    #[error("menu item is already at the bottom")]
    AlreadyAtBottom,

    #[error("{0}")]
    Invalid(String),

    #[error("menu database error")]
    Database(#[from] sqlx::Error),
}

/// Direction for a single-step move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(MenuError::Invalid(format!("unknown direction: {other}"))),
        }
    }
}

/// Where a menu item points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuTarget {
    Url(String),
    Page(Uuid),
}

impl MenuTarget {
    /// Build a target from form fields; exactly one must be present.
    ///
    /// Blank URLs count as absent.
    pub fn from_parts(url: Option<&str>, page_id: Option<Uuid>) -> Result<Self, MenuError> {
        let url = url.map(str::trim).filter(|u| !u.is_empty());
        match (url, page_id) {
            (Some(url), None) => Ok(MenuTarget::Url(url.to_string())),
            (None, Some(page_id)) => Ok(MenuTarget::Page(page_id)),
            (Some(_), Some(_)) => Err(MenuError::Invalid(
                "choose either a URL or a page, not both".into(),
            )),
            (None, None) => Err(MenuError::Invalid("a URL or a page is required".into())),
        }
    }

    /// URL column value.
    pub fn url(&self) -> Option<&str> {
        match self {
            MenuTarget::Url(url) => Some(url),
            MenuTarget::Page(_) => None,
        }
    }

    /// Page reference column value.
    pub fn page_id(&self) -> Option<Uuid> {
        match self {
            MenuTarget::Url(_) => None,
            MenuTarget::Page(id) => Some(*id),
        }
    }
}

/// Trimmed, non-empty label.
pub fn validate_label(label: &str) -> Result<String, MenuError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(MenuError::Invalid("label is required".into()));
    }
    if label.chars().count() > 255 {
        return Err(MenuError::Invalid("label is too long".into()));
    }
    Ok(label.to_string())
}

/// An item's identity and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct Slot {
    pub id: Uuid,
    pub position: i32,
}

/// A position write: set item `id` to `position`.
pub type Assignment = (Uuid, i32);

/// Position for a newly appended item.
pub fn next_position(slots: &[Slot]) -> i32 {
    slots.iter().map(|s| s.position).max().map_or(0, |max| max + 1)
}

/// Swap an item with its nearest neighbor in `direction`.
///
/// The neighbor is the item with the closest position strictly before
/// (up) or after (down) the moved one. The returned writes exchange the two
/// positions.
pub fn plan_move(slots: &[Slot], id: Uuid, direction: Direction) -> Result<[Assignment; 2], MenuError> {
    let item = slots
        .iter()
        .find(|s| s.id == id)
        .ok_or(MenuError::NotFound)?;

    let neighbor = match direction {
        Direction::Up => slots
            .iter()
            .filter(|s| s.position < item.position)
            .max_by_key(|s| s.position)
            .ok_or(MenuError::AlreadyAtTop)?,
        Direction::Down => slots
            .iter()
            .filter(|s| s.position > item.position)
            .min_by_key(|s| s.position)
            .ok_or(MenuError::AlreadyAtBottom)?,
    };

    Ok([
        (item.id, neighbor.position),
        (neighbor.id, item.position),
    ])
}

/// Writes that renumber `slots` to `0..N-1`, keeping their relative order.
///
/// Only items whose position actually changes are returned. Ties are
/// broken by id so the result is deterministic.
pub fn compact(slots: &[Slot]) -> Vec<Assignment> {
    let mut ordered: Vec<&Slot> = slots.iter().collect();
    ordered.sort_by_key(|s| (s.position, s.id));

    ordered
        .into_iter()
        .zip(0..)
        .filter(|(slot, position)| slot.position != *position)
        .map(|(slot, position)| (slot.id, position))
        .collect()
}

/// Remove an item and compact the positions of the rest.
pub fn plan_delete(slots: &[Slot], id: Uuid) -> Result<Vec<Assignment>, MenuError> {
    if !slots.iter().any(|s| s.id == id) {
        return Err(MenuError::NotFound);
    }
    let remaining: Vec<Slot> = slots.iter().copied().filter(|s| s.id != id).collect();
    Ok(compact(&remaining))
}

/// Pair replacement entries with positions `0..N-1` in list order.
pub fn plan_replace<T>(entries: Vec<T>) -> Vec<(T, i32)> {
    entries.into_iter().zip(0..).collect()
}

/// Apply assignments to slots, in memory.
pub fn apply(slots: &mut [Slot], assignments: &[Assignment]) {
    for (id, position) in assignments {
        if let Some(slot) = slots.iter_mut().find(|s| s.id == *id) {
            slot.position = *position;
        }
    }
}

/// Whether positions are exactly `0..N-1`.
pub fn is_dense(slots: &[Slot]) -> bool {
    let mut positions: Vec<i32> = slots.iter().map(|s| s.position).collect();
    positions.sort_unstable();
    positions.iter().copied().eq(0..slots.len() as i32)
}
