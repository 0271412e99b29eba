// src/navigation/planner.rs
// Artificial potential field: goal attraction plus repulsion from scanned
// obstacles and from the other robots of the fleet.
//
// All forces are summed in the world frame. Scan bearings are body-relative
// and get rotated by the robot heading before summation.

use log::warn;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::config::Goal;
use crate::core::{ObstaclePoint, Pose};
use crate::error::PotFieldError;

/// Tunable field parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Attractive gain λ (force per meter of goal distance)
    pub attractive_gain: f64,
    /// Repulsive gain α
    pub repulsive_gain: f64,
    /// Influence radius β; obstacles at or beyond it exert no force
    pub influence_radius: f64,
    /// At or below this distance repulsion saturates
    pub safe_distance: f64,
    /// Denominator guard ε; saturated repulsion is α / ε²
    pub epsilon: f64,
    /// Goal distance under which attraction is suppressed
    pub goal_tolerance: f64,
    /// Cap on every force term and on the resultant
    pub max_force: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            attractive_gain: 1.0,
            repulsive_gain: 0.5,
            influence_radius: 2.0,
            safe_distance: 0.3,
            epsilon: 0.1,
            goal_tolerance: 0.05,
            max_force: 50.0,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), PotFieldError> {
        let non_negative = [
            ("attractive_gain", self.attractive_gain),
            ("repulsive_gain", self.repulsive_gain),
            ("goal_tolerance", self.goal_tolerance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(PotFieldError::Config(format!(
                    "{} must be finite and >= 0, got {}",
                    name, value
                )));
            }
        }
        let positive = [
            ("epsilon", self.epsilon),
            ("safe_distance", self.safe_distance),
            ("influence_radius", self.influence_radius),
            ("max_force", self.max_force),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(PotFieldError::Config(format!(
                    "{} must be finite and > 0, got {}",
                    name, value
                )));
            }
        }
        if self.safe_distance >= self.influence_radius {
            return Err(PotFieldError::Config(format!(
                "safe_distance ({}) must be below influence_radius ({})",
                self.safe_distance, self.influence_radius
            )));
        }
        Ok(())
    }
}

/// Resultant force in the world frame. Components are always finite.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ForceVector {
    pub fx: f64,
    pub fy: f64,
}

impl ForceVector {
    pub fn new(fx: f64, fy: f64) -> Self {
        ForceVector { fx, fy }
    }

    pub fn zero() -> Self {
        ForceVector::default()
    }

    pub fn magnitude(&self) -> f64 {
        self.fx.hypot(self.fy)
    }

    /// World-frame direction (radians)
    pub fn direction(&self) -> f64 {
        self.fy.atan2(self.fx)
    }
}

impl From<Vector2<f64>> for ForceVector {
    fn from(v: Vector2<f64>) -> Self {
        ForceVector { fx: v.x, fy: v.y }
    }
}

// Scales `v` down to `max` length. Anything non-finite collapses to zero.
fn clamp_norm(v: Vector2<f64>, max: f64) -> Vector2<f64> {
    let norm = v.norm();
    if !norm.is_finite() {
        return Vector2::zeros();
    }
    if norm > max { v * (max / norm) } else { v }
}

fn unit(angle: f64) -> Vector2<f64> {
    Vector2::new(angle.cos(), angle.sin())
}

/// Computes the net steering force for one robot
#[derive(Debug, Clone)]
pub struct PotentialFieldSolver {
    config: SolverConfig,
}

impl PotentialFieldSolver {
    /// Create a solver from validated parameters
    pub fn new(config: SolverConfig) -> Result<Self, PotFieldError> {
        config.validate()?;
        Ok(PotentialFieldSolver { config })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Repulsion magnitude used whenever an obstacle is at or inside the safe distance
    pub fn saturation(&self) -> f64 {
        let eps = self.config.epsilon;
        (self.config.repulsive_gain / (eps * eps)).min(self.config.max_force)
    }

    /// Repulsion magnitude for an obstacle at `distance`.
    ///
    /// Saturated at or below the safe distance, the APF gradient
    /// `α (1/d - 1/β) / d²` inside the influence radius, zero beyond it.
    pub fn repulsive_magnitude(&self, distance: f64) -> f64 {
        let SolverConfig {
            repulsive_gain: alpha,
            influence_radius: beta,
            safe_distance,
            max_force,
            ..
        } = self.config;

        if distance.is_nan() {
            return 0.0;
        }
        if distance <= safe_distance {
            return self.saturation();
        }
        if distance >= beta {
            return 0.0;
        }
        // d² can underflow for subnormal distances
        let squared = distance * distance;
        if squared == 0.0 {
            return self.saturation();
        }
        let magnitude = alpha * (1.0 / distance - 1.0 / beta) / squared;
        magnitude.clamp(0.0, max_force)
    }

    /// Repulsion from an obstacle at `distance` along world bearing `bearing`;
    /// points away from the obstacle
    pub fn repulsive_force(&self, distance: f64, bearing: f64) -> Vector2<f64> {
        let magnitude = self.repulsive_magnitude(distance);
        if magnitude == 0.0 {
            return Vector2::zeros();
        }
        -unit(bearing) * magnitude
    }

    /// Linear attraction `λ d_goal` toward the goal, zero within the goal tolerance
    pub fn attractive_force(&self, pose: &Pose, goal: &Goal) -> Vector2<f64> {
        let distance = pose.distance_to(goal.x, goal.y);
        if !distance.is_finite() || distance < self.config.goal_tolerance {
            return Vector2::zeros();
        }
        let magnitude = self.config.attractive_gain * distance;
        clamp_norm(unit(pose.bearing_to(goal.x, goal.y)) * magnitude, self.config.max_force)
    }

    /// Resultant force for `pose`.
    ///
    /// `obstacles` carry body-relative bearings; every neighbor pose is treated
    /// as one more obstacle at its observed relative position.
    pub fn compute<'a, N, O>(
        &self,
        pose: &Pose,
        goal: &Goal,
        neighbors: N,
        obstacles: O,
    ) -> ForceVector
    where
        N: IntoIterator<Item = &'a Pose>,
        O: IntoIterator<Item = ObstaclePoint>,
    {
        let mut total = self.attractive_force(pose, goal);

        for point in obstacles {
            total += self.repulsive_force(point.distance, pose.heading + point.bearing);
        }

        for other in neighbors {
            let distance = pose.distance_to(other.x, other.y);
            total += self.repulsive_force(distance, pose.bearing_to(other.x, other.y));
        }

        if !(total.x.is_finite() && total.y.is_finite()) {
            warn!("Non-finite resultant force, substituting zero");
            return ForceVector::zero();
        }
        clamp_norm(total, self.config.max_force).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::time::Duration;

    fn solver() -> PotentialFieldSolver {
        PotentialFieldSolver::new(SolverConfig::default()).unwrap()
    }

    const NO_OBSTACLES: [ObstaclePoint; 0] = [];

    fn no_neighbors() -> [&'static Pose; 0] {
        []
    }

    fn pose(x: f64, y: f64, heading: f64) -> Pose {
        Pose::new(x, y, heading, Duration::from_secs(1))
    }

    #[rstest]
    #[case(SolverConfig { epsilon: 0.0, ..SolverConfig::default() })]
    #[case(SolverConfig { safe_distance: 2.0, ..SolverConfig::default() })]
    #[case(SolverConfig { safe_distance: 0.0, ..SolverConfig::default() })]
    #[case(SolverConfig { repulsive_gain: -1.0, ..SolverConfig::default() })]
    #[case(SolverConfig { max_force: f64::NAN, ..SolverConfig::default() })]
    fn test_invalid_config_rejected(#[case] config: SolverConfig) {
        assert!(matches!(
            PotentialFieldSolver::new(config),
            Err(PotFieldError::Config(_))
        ));
    }

    #[test]
    fn test_goal_ahead_pulls_along_x() {
        let force = solver().compute(&pose(0.0, 0.0, 0.0), &Goal::new(10.0, 0.0), no_neighbors(), NO_OBSTACLES);
        assert!(force.fx > 0.0);
        assert!(force.fy.abs() < 1e-12);
        assert!((force.fx - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_attraction_suppressed_at_goal() {
        let force = solver().compute(&pose(1.0, 1.0, 0.0), &Goal::new(1.01, 1.0), no_neighbors(), NO_OBSTACLES);
        assert_eq!(force, ForceVector::zero());
    }

    #[test]
    fn test_close_obstacle_saturates_away() {
        let s = solver();
        let obstacle = ObstaclePoint { distance: 0.1, bearing: 0.0 };
        let force = s.compute(&pose(0.0, 0.0, 0.0), &Goal::new(0.0, 0.0), no_neighbors(), [obstacle]);
        assert!((force.fx + s.saturation()).abs() < 1e-9);
        assert!(force.fy.abs() < 1e-9);
    }

    #[test]
    fn test_zero_distance_uses_saturation() {
        let s = solver();
        assert_eq!(s.repulsive_magnitude(0.0), s.saturation());
        assert!(s.repulsive_force(0.0, 1.0).iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_default_saturation_just_under_cap() {
        let s = solver();
        assert_eq!(s.saturation(), 0.5 / (0.1 * 0.1));
        assert!(s.saturation() < s.config().max_force);
        assert!((s.saturation() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_underflowing_distance_uses_saturation() {
        let s = PotentialFieldSolver::new(SolverConfig {
            safe_distance: 1e-200,
            max_force: 1000.0,
            ..SolverConfig::default()
        })
        .unwrap();
        // Outside the safe distance, but d² rounds to zero
        let d = 1e-170;
        assert_eq!(d * d, 0.0);
        assert_eq!(s.repulsive_magnitude(d), s.saturation());
    }

    #[test]
    fn test_obstacle_bearing_is_body_relative() {
        // Facing +Y, an obstacle dead ahead pushes toward -Y
        let s = solver();
        let obstacle = ObstaclePoint { distance: 1.0, bearing: 0.0 };
        let heading = std::f64::consts::FRAC_PI_2;
        let force = s.compute(&pose(0.0, 0.0, heading), &Goal::new(0.0, 0.0), no_neighbors(), [obstacle]);
        assert!(force.fy < 0.0);
        assert!(force.fx.abs() < 1e-9);
    }

    #[test]
    fn test_neighbor_repels() {
        let s = solver();
        let me = pose(0.0, 0.0, 0.0);
        let other = pose(0.0, 1.0, 0.0);
        let force = s.compute(&me, &Goal::new(0.0, 0.0), [&other], NO_OBSTACLES);
        assert!(force.fy < 0.0);
        assert!((force.magnitude() - s.repulsive_magnitude(1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_resultant_capped() {
        let s = solver();
        let far_goal = Goal::new(1.0e6, 0.0);
        let force = s.compute(&pose(0.0, 0.0, 0.0), &far_goal, no_neighbors(), NO_OBSTACLES);
        assert!(force.magnitude() <= s.config().max_force + 1e-9);
    }

    proptest! {
        #[test]
        fn prop_zero_beyond_influence(d in 2.0f64..1.0e6) {
            prop_assert_eq!(solver().repulsive_magnitude(d), 0.0);
        }

        #[test]
        fn prop_saturated_inside_safe_distance(d in 0.0f64..=0.3) {
            let s = solver();
            prop_assert_eq!(s.repulsive_magnitude(d), s.saturation());
        }

        #[test]
        fn prop_monotonic_between_safe_and_influence(a in 0.3001f64..2.0, b in 0.3001f64..2.0) {
            let s = solver();
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(s.repulsive_magnitude(near) >= s.repulsive_magnitude(far));
        }

        #[test]
        fn prop_attraction_points_to_goal(
            x in -50.0f64..50.0, y in -50.0f64..50.0,
            gx in -50.0f64..50.0, gy in -50.0f64..50.0,
        ) {
            let s = solver();
            let p = pose(x, y, 0.0);
            let goal = Goal::new(gx, gy);
            let f = s.attractive_force(&p, &goal);
            let to_goal = Vector2::new(gx - x, gy - y);
            if to_goal.norm() < s.config().goal_tolerance {
                prop_assert_eq!(f.norm(), 0.0);
            } else {
                prop_assert!(f.dot(&to_goal) > 0.0);
                prop_assert!((f.perp(&to_goal)).abs() <= 1e-6 * to_goal.norm().max(1.0) * f.norm().max(1.0));
            }
        }

        #[test]
        fn prop_resultant_finite(
            distances in proptest::collection::vec(0.0f64..5.0, 0..20),
            heading in -3.14f64..3.14,
        ) {
            let s = solver();
            let obstacles = distances.iter().enumerate().map(|(i, &d)| ObstaclePoint {
                distance: d,
                bearing: i as f64 * 0.3,
            });
            let f = s.compute(&pose(0.0, 0.0, heading), &Goal::new(3.0, -2.0), no_neighbors(), obstacles);
            prop_assert!(f.fx.is_finite() && f.fy.is_finite());
            prop_assert!(f.magnitude() <= s.config().max_force + 1e-9);
        }
    }
}
