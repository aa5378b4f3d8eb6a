use crate::{core::VisualState, model::AnimKind};

/// Symmetric triangle wave: 0 at progress 0, 1 at 0.5, back to 0 toward 1.
pub fn triangle(progress: f64) -> f64 {
    let p = progress.rem_euclid(1.0);
    if p < 0.5 { p * 2.0 } else { 2.0 - p * 2.0 }
}

/// Quadratic ease-in-out over 0..=1.
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
    }
}

/// The animation state function: a pure, closed-form map from cyclic progress
/// to a transform descriptor. Both the interactive preview and the offline
/// compositor call this with their own independently derived progress, which
/// is what keeps the two renderers in exact visual agreement.
///
/// Path kinds return the identity state; their visuals travel along geometry
/// instead of transforming the element (see `path_anim`). Unknown input is
/// impossible with a closed enum, so there is no error path.
pub fn animation_state(kind: AnimKind, progress: f64, base_opacity: f64) -> VisualState {
    let mut state = VisualState::identity(base_opacity);
    let p = progress.rem_euclid(1.0);

    match kind {
        AnimKind::Pulse => {
            let e = ease_in_out(triangle(p));
            state.scale = 1.0 + 0.1 * e;
            let ceil = (base_opacity + 0.4 * base_opacity).min(1.0);
            state.opacity = base_opacity + (ceil - base_opacity) * e;
        }
        AnimKind::Bounce => {
            state.translate.y = -15.0 * triangle(p);
        }
        AnimKind::Fade => {
            let floor = (base_opacity - 0.4 * base_opacity).clamp(0.05, 1.0);
            let ceil = (base_opacity + 0.4 * base_opacity).clamp(0.05, 1.0);
            state.opacity = ceil + (floor - ceil) * triangle(p);
        }
        AnimKind::Shake => {
            // Three direction changes per cycle, amplitude 5.
            state.translate.x = if p < 0.25 {
                5.0 * (p / 0.25)
            } else if p < 0.5 {
                5.0 - 10.0 * ((p - 0.25) / 0.25)
            } else if p < 0.75 {
                -5.0 + 10.0 * ((p - 0.5) / 0.25)
            } else {
                5.0 - 5.0 * ((p - 0.75) / 0.25)
            };
        }
        AnimKind::Flash => {
            let floor = (base_opacity - 0.4 * base_opacity).clamp(0.05, 1.0);
            let ceil = (base_opacity + 0.4 * base_opacity).clamp(0.05, 1.0);
            state.opacity = ceil + (floor - ceil) * triangle((p * 2.0).rem_euclid(1.0));
        }
        AnimKind::Spin => {
            state.rotation_deg = 360.0 * p;
        }
        AnimKind::Zoom => {
            let e = ease_in_out(triangle(p));
            state.scale = 0.9 + 0.3 * e;
        }
        AnimKind::Float => {
            // Small closed loop through two hover points.
            let a = kurbo::Vec2::ZERO;
            let b = kurbo::Vec2::new(4.0, -6.0);
            let c = kurbo::Vec2::new(-4.0, -6.0);
            state.translate = if p < 0.33 {
                a.lerp(b, p / 0.33)
            } else if p < 0.66 {
                b.lerp(c, (p - 0.33) / 0.33)
            } else {
                c.lerp(a, (p - 0.66) / 0.34)
            };
        }
        AnimKind::Train | AnimKind::TrainLoop | AnimKind::Dash => {}
    }

    state
}
