//! Overlap resolution between label quads.
//!
//! Quads are tested with the separating-axis theorem in integer display
//! space. Every pair of surviving candidates is tested, within a line as
//! well as across lines. When two collide, the candidate from the line
//! that currently has more candidates is dropped; on a tie the later
//! candidate is dropped.
//!
//! Removals are marked during the pairwise pass and swept afterwards, so
//! the groups are never mutated while being iterated.

use glam::{I64Vec2, IVec2};
use log::debug;

use crate::placer::LabelGroup;

/// Quad corners in display pixels: top-left, top-right, bottom-right,
/// bottom-left.
pub type DisplayQuad = [IVec2; 4];

/// Rotate by -90 degrees.
const fn perp(v: I64Vec2) -> I64Vec2 {
    I64Vec2::new(v.y, -v.x)
}

/// Whether every corner of `quad` lies strictly on the outer side of the
/// edge `from -> to`.
fn all_outside(from: IVec2, to: IVec2, quad: &DisplayQuad) -> bool {
    let from = from.as_i64vec2();
    let normal = perp(to.as_i64vec2() - from);
    quad.iter()
        .all(|corner| normal.dot(corner.as_i64vec2() - from) > 0)
}

/// Whether any edge of `edges` separates it from `other`.
fn has_separating_edge(edges: &DisplayQuad, other: &DisplayQuad) -> bool {
    let [tl, tr, br, bl] = *edges;
    all_outside(tl, bl, other)
        || all_outside(bl, br, other)
        || all_outside(br, tr, other)
        || all_outside(tr, tl, other)
}

/// Separating-axis overlap test for two convex display quads.
#[must_use]
pub fn quads_overlap(a: &DisplayQuad, b: &DisplayQuad) -> bool {
    !(has_separating_edge(b, a) || has_separating_edge(a, b))
}

/// Position of a candidate: group index and index within the group.
type Slot = (usize, usize);

fn quad(groups: &[LabelGroup], (g, c): Slot) -> &DisplayQuad {
    &groups[g].candidates[c].corners_display
}

/// Remove overlapping candidates from `groups` in place.
///
/// Returns the number of candidates removed.
pub fn resolve_overlaps(groups: &mut [LabelGroup]) -> usize {
    let slots: Vec<Slot> = groups
        .iter()
        .enumerate()
        .flat_map(|(g, group)| (0..group.len()).map(move |c| (g, c)))
        .collect();

    let mut remaining: Vec<usize> = groups.iter().map(LabelGroup::len).collect();
    let mut removed = vec![false; slots.len()];

    for a in 0..slots.len() {
        if removed[a] {
            continue;
        }
        for b in (a + 1)..slots.len() {
            if removed[b] || !quads_overlap(quad(groups, slots[a]), quad(groups, slots[b])) {
                continue;
            }
            let (group_a, group_b) = (slots[a].0, slots[b].0);
            if remaining[group_a] > remaining[group_b] {
                removed[a] = true;
                remaining[group_a] -= 1;
                break;
            }
            removed[b] = true;
            remaining[group_b] -= 1;
        }
    }

    let mut doomed = slots
        .iter()
        .zip(&removed)
        .filter(|&(_, &gone)| gone)
        .map(|(&slot, _)| slot)
        .collect::<Vec<_>>();
    let count = doomed.len();

    doomed.sort_unstable_by(|x, y| y.cmp(x));
    for (g, c) in doomed {
        groups[g].candidates.remove(c);
    }

    debug!("overlap resolution removed {count} candidates");
    count
}
