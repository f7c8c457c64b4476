//! Box World Integrator
//!
//! Default [`PhysicsBackend`]: axis-aligned boxes, semi-implicit Euler, a
//! ground plane at `y = 0`, and a bottom-up sequential contact pass.
//!
//! Boxes never rotate. Tipping is modelled instead: a resting body whose
//! centre of mass lies outside the rectangle spanned by its supports
//! topples. A toppled body stops colliding with other bodies (it still lands
//! on the ground), gets a sideways nudge away from its support and falls,
//! so anything it was holding up loses support on the next step.
//!
//! Contact order is fixed (sorted by height, then handle), so a given input
//! always takes the same path through the solver on one build.

use glam::{Vec2, Vec3};

use crate::physics::backend::{BodyDesc, BodyHandle, BodyKind, PhysicsBackend, PhysicsError};
use crate::physics::tuning::PhysicsConfig;

#[derive(Clone, Debug)]
struct Body {
    position: Vec3,
    velocity: Vec3,
    half: Vec3,
    kind: BodyKind,
    toppled: bool,
    peak_impact: f32,
}

impl Body {
    #[inline]
    fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    #[inline]
    fn bottom(&self) -> f32 {
        self.position.y - self.half.y
    }

    #[inline]
    fn top(&self) -> f32 {
        self.position.y + self.half.y
    }

    /// Footprint on the XZ plane as (min, max).
    #[inline]
    fn footprint(&self) -> (Vec2, Vec2) {
        let c = Vec2::new(self.position.x, self.position.z);
        let h = Vec2::new(self.half.x, self.half.z);
        (c - h, c + h)
    }
}

/// Axis-aligned box world.
#[derive(Clone, Debug)]
pub struct BoxWorld {
    bodies: Vec<Body>,
    gravity: f32,
    friction: f32,
    iterations: u32,
    slop: f32,
    support_gap: f32,
    topple_speed: f32,
}

impl BoxWorld {
    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// True when the world holds no bodies.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Whether `body` has toppled.
    pub fn is_toppled(&self, body: BodyHandle) -> Result<bool, PhysicsError> {
        Ok(self.body(body)?.toppled)
    }

    fn body(&self, handle: BodyHandle) -> Result<&Body, PhysicsError> {
        self.bodies.get(handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    /// Per-axis overlap of two boxes. Negative means a gap.
    #[inline]
    fn overlap(a: &Body, b: &Body) -> Vec3 {
        a.half + b.half - (a.position - b.position).abs()
    }

    /// Face contact: touching or penetrating on every axis, with real
    /// overlap on at least two. Edge and corner grazes don't count.
    #[inline]
    fn is_face_contact(overlap: Vec3, slop: f32) -> bool {
        if overlap.min_element() <= -slop {
            return false;
        }
        let solid = (overlap.x > slop) as u8 + (overlap.y > slop) as u8 + (overlap.z > slop) as u8;
        solid >= 2
    }

    fn integrate(&mut self, dt: f32) {
        for body in self.bodies.iter_mut().filter(|b| b.is_dynamic()) {
            body.velocity.y -= self.gravity * dt;
            body.position += body.velocity * dt;
        }
    }

    fn resolve_ground(&mut self, i: BodyHandle) {
        let friction = self.friction;
        let body = &mut self.bodies[i];
        if body.bottom() >= 0.0 {
            return;
        }
        body.position.y = body.half.y;
        if body.velocity.y < 0.0 {
            let approach = -body.velocity.y;
            body.peak_impact = body.peak_impact.max(approach);
            body.velocity.y = 0.0;
            apply_friction(&mut body.velocity, Vec3::Y, friction * approach);
        }
    }

    /// Push `i` out of `j` and cancel the approaching velocity.
    fn resolve_pair(&mut self, i: BodyHandle, j: BodyHandle) {
        let overlap = Self::overlap(&self.bodies[i], &self.bodies[j]);
        if !Self::is_face_contact(overlap, self.slop) {
            return;
        }

        let axis = min_axis(overlap);
        let depth = overlap[axis];
        let delta = self.bodies[i].position - self.bodies[j].position;
        let mut normal = Vec3::ZERO;
        normal[axis] = if delta[axis] >= 0.0 { 1.0 } else { -1.0 };

        if depth > 0.0 {
            self.bodies[i].position += normal * depth;
        }

        let other_dynamic = self.bodies[j].is_dynamic();
        let other_velocity = if other_dynamic {
            self.bodies[j].velocity
        } else {
            Vec3::ZERO
        };
        let relative = self.bodies[i].velocity - other_velocity;
        let vn = relative.dot(normal);
        if vn >= 0.0 {
            return;
        }

        let approach = -vn;
        let vertical = axis == 1;
        if vertical || !other_dynamic {
            // Supports and static walls absorb the whole impulse.
            let body = &mut self.bodies[i];
            body.peak_impact = body.peak_impact.max(approach);
            body.velocity -= normal * vn;
            if vertical && normal.y > 0.0 {
                let mut tangential = body.velocity - other_velocity;
                tangential.y = 0.0;
                let before = tangential;
                apply_friction(&mut tangential, Vec3::Y, self.friction * approach);
                body.velocity += tangential - before;
            }
        } else {
            // Equal masses side by side: split the impulse.
            let half = normal * (vn * 0.5);
            self.bodies[i].velocity -= half;
            self.bodies[j].velocity += half;
            for k in [i, j] {
                let body = &mut self.bodies[k];
                body.peak_impact = body.peak_impact.max(approach);
            }
        }
    }

    /// Topple `i` if its centre of mass overhangs its supports.
    fn check_balance(&mut self, i: BodyHandle) {
        let body = &self.bodies[i];
        if body.toppled || body.bottom() <= self.support_gap {
            return;
        }

        let (own_min, own_max) = body.footprint();
        let mut support: Option<(Vec2, Vec2)> = None;

        for (j, other) in self.bodies.iter().enumerate() {
            if j == i || other.toppled {
                continue;
            }
            let gap = body.bottom() - other.top();
            if gap.abs() > self.support_gap {
                continue;
            }
            let (other_min, other_max) = other.footprint();
            let lo = own_min.max(other_min);
            let hi = own_max.min(other_max);
            if hi.x - lo.x <= self.slop || hi.y - lo.y <= self.slop {
                continue;
            }
            support = Some(match support {
                Some((min, max)) => (min.min(lo), max.max(hi)),
                None => (lo, hi),
            });
        }

        // No support at all: free fall, handled by gravity.
        let Some((min, max)) = support else {
            return;
        };

        let com = Vec2::new(body.position.x, body.position.z);
        let inside = com.x >= min.x - self.slop
            && com.x <= max.x + self.slop
            && com.y >= min.y - self.slop
            && com.y <= max.y + self.slop;
        if inside {
            return;
        }

        let away = (com - (min + max) * 0.5)
            .try_normalize()
            .unwrap_or(Vec2::X);
        let body = &mut self.bodies[i];
        body.toppled = true;
        body.velocity += Vec3::new(away.x, 0.0, away.y) * self.topple_speed;
    }
}

/// Index of the smallest component.
#[inline]
fn min_axis(v: Vec3) -> usize {
    if v.x <= v.y && v.x <= v.z {
        0
    } else if v.y <= v.z {
        1
    } else {
        2
    }
}

/// Remove up to `budget` of the velocity component perpendicular to `normal`.
fn apply_friction(velocity: &mut Vec3, normal: Vec3, budget: f32) {
    let tangential = *velocity - normal * velocity.dot(normal);
    let speed = tangential.length();
    if speed <= f32::EPSILON {
        return;
    }
    let reduce = speed.min(budget);
    *velocity -= tangential * (reduce / speed);
}

impl PhysicsBackend for BoxWorld {
    fn create(config: &PhysicsConfig) -> Self {
        Self {
            bodies: Vec::new(),
            gravity: config.gravity,
            friction: config.friction,
            iterations: config.solver_iterations.max(1),
            slop: config.contact_slop,
            support_gap: config.support_gap,
            topple_speed: config.topple_speed,
        }
    }

    fn add_body(&mut self, desc: BodyDesc) -> Result<BodyHandle, PhysicsError> {
        if !desc.position.is_finite() || !desc.velocity.is_finite() {
            return Err(PhysicsError::InvalidBody(format!(
                "non-finite state at {:?}",
                desc.position
            )));
        }
        if !desc.half_extents.is_finite() || desc.half_extents.min_element() <= 0.0 {
            return Err(PhysicsError::InvalidBody(format!(
                "bad half extents {:?}",
                desc.half_extents
            )));
        }

        let velocity = match desc.kind {
            BodyKind::Static => Vec3::ZERO,
            BodyKind::Dynamic => desc.velocity,
        };
        self.bodies.push(Body {
            position: desc.position,
            velocity,
            half: desc.half_extents,
            kind: desc.kind,
            toppled: false,
            peak_impact: 0.0,
        });
        Ok(self.bodies.len() - 1)
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError> {
        let target = self
            .bodies
            .get_mut(body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        if target.is_dynamic() {
            target.velocity = velocity;
        }
        Ok(())
    }

    fn step(&mut self, dt: f32) -> Result<(), PhysicsError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PhysicsError::InvalidTimestep(dt));
        }

        self.integrate(dt);

        let mut order: Vec<BodyHandle> = (0..self.bodies.len())
            .filter(|&i| self.bodies[i].is_dynamic())
            .collect();
        order.sort_by(|&a, &b| {
            self.bodies[a]
                .bottom()
                .total_cmp(&self.bodies[b].bottom())
                .then(a.cmp(&b))
        });
        let mut rank = vec![usize::MAX; self.bodies.len()];
        for (k, &i) in order.iter().enumerate() {
            rank[i] = k;
        }

        for _ in 0..self.iterations {
            for (k, &i) in order.iter().enumerate() {
                self.resolve_ground(i);
                if self.bodies[i].toppled {
                    continue;
                }
                for j in 0..self.bodies.len() {
                    if j == i || self.bodies[j].toppled {
                        continue;
                    }
                    // Higher dynamic bodies resolve against this one later.
                    if self.bodies[j].is_dynamic() && rank[j] > k {
                        continue;
                    }
                    self.resolve_pair(i, j);
                }
            }
        }

        for &i in &order {
            self.check_balance(i);
        }

        for &i in &order {
            let body = &self.bodies[i];
            if !body.position.is_finite() || !body.velocity.is_finite() {
                return Err(PhysicsError::NonFinite(i));
            }
        }

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(
            dynamic = order.len(),
            toppled = self.bodies.iter().filter(|b| b.toppled).count(),
            "box world step"
        );

        Ok(())
    }

    fn position(&self, body: BodyHandle) -> Result<Vec3, PhysicsError> {
        Ok(self.body(body)?.position)
    }

    fn velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError> {
        Ok(self.body(body)?.velocity)
    }

    fn contacts(&self, body: BodyHandle) -> Result<Vec<BodyHandle>, PhysicsError> {
        let this = self.body(body)?;
        Ok(self
            .bodies
            .iter()
            .enumerate()
            .filter(|&(j, other)| {
                j != body && Self::is_face_contact(Self::overlap(this, other), self.slop)
            })
            .map(|(j, _)| j)
            .collect())
    }

    fn peak_impact(&self, body: BodyHandle) -> Result<f32, PhysicsError> {
        Ok(self.body(body)?.peak_impact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{slot_center, Orientation};

    fn world() -> BoxWorld {
        BoxWorld::create(&PhysicsConfig::default())
    }

    fn block(world: &mut BoxWorld, level: usize, slot: usize, kind: BodyKind) -> BodyHandle {
        let half = Orientation::for_level(level).half_extents();
        world
            .add_body(BodyDesc::new(slot_center(level, slot), half, kind))
            .unwrap()
    }

    fn run(world: &mut BoxWorld, steps: u32) {
        for _ in 0..steps {
            world.step(1.0 / 60.0).unwrap();
        }
    }

    #[test]
    fn test_free_fall_lands_on_ground() {
        let mut w = world();
        let half = Orientation::Horizontal.half_extents();
        let b = w
            .add_body(BodyDesc::new(Vec3::new(0.0, 3.0, 0.0), half, BodyKind::Dynamic))
            .unwrap();
        run(&mut w, 120);
        let p = w.position(b).unwrap();
        assert!((p.y - half.y).abs() < 1e-3);
        assert!(w.peak_impact(b).unwrap() > 1.0);
    }

    #[test]
    fn test_dynamic_stack_stays_at_rest() {
        let mut w = world();
        let mut handles = Vec::new();
        for level in 0..6 {
            for slot in 0..3 {
                handles.push((level, slot, block(&mut w, level, slot, BodyKind::Dynamic)));
            }
        }
        run(&mut w, 80);
        for (level, slot, h) in handles {
            let p = w.position(h).unwrap();
            assert!(
                (p - slot_center(level, slot)).length() < 1e-3,
                "block ({level}, {slot}) drifted to {p:?}"
            );
            assert!(!w.is_toppled(h).unwrap());
        }
    }

    #[test]
    fn test_middle_support_is_balanced() {
        let mut w = world();
        block(&mut w, 0, 1, BodyKind::Static);
        let top = block(&mut w, 1, 0, BodyKind::Dynamic);
        run(&mut w, 30);
        assert!(!w.is_toppled(top).unwrap());
        assert!((w.position(top).unwrap() - slot_center(1, 0)).length() < 1e-3);
    }

    #[test]
    fn test_edge_support_topples() {
        let mut w = world();
        block(&mut w, 0, 2, BodyKind::Static);
        let top = block(&mut w, 1, 1, BodyKind::Dynamic);
        run(&mut w, 30);
        assert!(w.is_toppled(top).unwrap());
        assert!(w.position(top).unwrap().y < slot_center(1, 1).y - 0.5);
    }

    #[test]
    fn test_side_push_moves_neighbour() {
        let mut w = world();
        let a = block(&mut w, 0, 0, BodyKind::Dynamic);
        let b = block(&mut w, 0, 1, BodyKind::Dynamic);
        w.set_velocity(a, Vec3::new(0.0, 0.0, 3.0)).unwrap();
        run(&mut w, 5);
        assert!(w.velocity(b).unwrap().z > 0.0);
        assert!(w.contacts(a).unwrap().contains(&b));
    }

    #[test]
    fn test_contacts_ignore_separated_bodies() {
        let mut w = world();
        let a = block(&mut w, 0, 1, BodyKind::Static);
        let half = Orientation::Horizontal.half_extents();
        let far = w
            .add_body(BodyDesc::new(Vec3::new(0.0, 0.5, 5.0), half, BodyKind::Dynamic))
            .unwrap();
        assert!(w.contacts(far).unwrap().is_empty());
        assert!(w.contacts(a).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_inputs() {
        let mut w = world();
        let half = Orientation::Horizontal.half_extents();
        let err = w
            .add_body(BodyDesc::new(Vec3::new(f32::NAN, 0.0, 0.0), half, BodyKind::Dynamic))
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidBody(_)));
        assert_eq!(w.step(0.0), Err(PhysicsError::InvalidTimestep(0.0)));
        assert_eq!(w.position(9), Err(PhysicsError::UnknownBody(9)));
    }

    #[test]
    fn test_runaway_velocity_reported() {
        let mut w = world();
        let b = block(&mut w, 3, 1, BodyKind::Dynamic);
        w.set_velocity(b, Vec3::new(f32::INFINITY, 0.0, 0.0)).unwrap();
        assert_eq!(w.step(1.0 / 60.0), Err(PhysicsError::NonFinite(b)));
    }
}
