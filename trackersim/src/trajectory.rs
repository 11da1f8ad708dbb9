//! Position sources replayed by sessions.

use serde::{Deserialize, Serialize};
use trackersim_protocol::TrajectorySample;

/// A finite, ordered sequence of position fixes.
pub trait TrajectorySource: Send + Sync {
    fn samples(&self) -> Vec<TrajectorySample>;
}

/// A point in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Initial great-circle bearing towards `other`, in `[0, 360)`.
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let delta = (other.longitude - self.longitude).to_radians();

        let y = delta.sin() * phi2.cos();
        let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta.cos();
        y.atan2(x).to_degrees().rem_euclid(360.0)
    }
}

/// Espinosa, MG.
pub const DEFAULT_ROUTE_START: GeoPoint = GeoPoint::new(-14.9257, -42.8168);
/// Mato Verde, MG.
pub const DEFAULT_ROUTE_END: GeoPoint = GeoPoint::new(-15.3951, -42.8609);

/// How reported courses are derived from the route bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStyle {
    /// Bearing with a slow drift of up to five degrees either side.
    #[default]
    Drift,
    /// As `Drift`, but never a multiple of five.
    ///
    /// Some text-protocol receivers treat round courses as placeholders.
    AvoidMultiplesOfFive,
}

/// Linear interpolation between two points.
///
/// Produces `iterations + 1` samples, the first at `start` and the last at
/// `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct StraightLineRoute {
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub iterations: usize,
    pub speed_kmh: u8,
    pub course_style: CourseStyle,
}

impl StraightLineRoute {
    pub fn new(start: GeoPoint, end: GeoPoint, iterations: usize, speed_kmh: u8) -> Self {
        Self {
            start,
            end,
            iterations,
            speed_kmh,
            course_style: CourseStyle::default(),
        }
    }

    pub fn with_course_style(mut self, style: CourseStyle) -> Self {
        self.course_style = style;
        self
    }

    fn course_at(&self, base: f64, step: usize) -> u16 {
        let drift = (step as f64 * 0.1) % 10.0 - 5.0;
        let mut course = ((base + drift) as i64).rem_euclid(360);
        if self.course_style == CourseStyle::AvoidMultiplesOfFive && course % 5 == 0 {
            course = (course + 1) % 360;
        }
        course as u16
    }
}

impl Default for StraightLineRoute {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_START, DEFAULT_ROUTE_END, 120, 50)
    }
}

impl TrajectorySource for StraightLineRoute {
    fn samples(&self) -> Vec<TrajectorySample> {
        let base = self.start.bearing_to(&self.end);
        let d_lat = self.end.latitude - self.start.latitude;
        let d_lon = self.end.longitude - self.start.longitude;

        (0..=self.iterations)
            .map(|step| {
                let t = if self.iterations == 0 {
                    0.0
                } else {
                    step as f64 / self.iterations as f64
                };
                TrajectorySample::new(
                    self.start.latitude + d_lat * t,
                    self.start.longitude + d_lon * t,
                    self.speed_kmh,
                    self.course_at(base, step),
                )
            })
            .collect()
    }
}

/// A fixed list of samples, replayed as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedTrack {
    pub samples: Vec<TrajectorySample>,
}

impl RecordedTrack {
    pub fn new(samples: Vec<TrajectorySample>) -> Self {
        Self { samples }
    }
}

impl TrajectorySource for RecordedTrack {
    fn samples(&self) -> Vec<TrajectorySample> {
        self.samples.clone()
    }
}
