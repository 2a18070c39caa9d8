//! Mark and sweep over the entity store. Each tick clears every mark, marks
//! what the active routes reach, then shows what was marked and hides the rest.

use crate::entity::EntityKind;
use crate::render::Renderer;
use crate::settings::DisplayToggles;
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityChanges {
    pub shown: usize,
    pub hidden: usize,
}

pub fn clear_marks(store: &mut EntityStore) {
    for kind in EntityKind::ALL {
        store.for_each_mut(kind, |entity| entity.clear_mark());
    }
}

/// Marks a route, its shapes and their stops, and the vehicles and trips
/// running on it. Returns false when the route is not resident.
pub fn mark_route(store: &mut EntityStore, route_id: &str, generation: u64) -> bool {
    match store.get_mut(EntityKind::Route, route_id) {
        Some(route) => route.mark(generation),
        None => return false,
    }

    let mut stop_ids = Vec::new();
    store.for_each_mut(EntityKind::Shape, |entity| {
        if entity.route_id() != Some(route_id) {
            return;
        }
        entity.mark(generation);
        if let Some(shape) = entity.as_shape() {
            stop_ids.extend(shape.stop_ids.iter().cloned());
        }
    });

    for stop_id in &stop_ids {
        if let Some(stop) = store.get_mut(EntityKind::Stop, stop_id) {
            stop.mark(generation);
        }
    }

    for kind in [EntityKind::Vehicle, EntityKind::Trip] {
        store.for_each_mut(kind, |entity| {
            if entity.route_id() == Some(route_id) {
                entity.mark(generation);
            }
        });
    }

    true
}

/// Brings every entity's visibility in line with its mark for `generation`
/// and its kind's display toggle, adding and removing renderables on change.
pub fn apply_visibility<R: Renderer>(
    store: &mut EntityStore,
    renderer: &mut R,
    display: &DisplayToggles,
    generation: u64,
) -> VisibilityChanges {
    let mut changes = VisibilityChanges::default();

    for kind in EntityKind::ALL {
        let displayed = display.is_displayed(kind);

        store.for_each_mut(kind, |entity| {
            let visible = displayed && entity.is_marked_in(generation);
            if visible == entity.visible {
                return;
            }
            entity.visible = visible;

            match visible {
                true => changes.shown += 1,
                false => changes.hidden += 1,
            }

            if let Some(handle) = entity.render_handle {
                match visible {
                    true => renderer.add_to_map(handle),
                    false => renderer.remove_from_map(handle),
                }
            }
        });
    }

    changes
}
