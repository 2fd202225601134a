//! 3-D math for the audio spatializer
//!
//! Just enough vector algebra to place a mono voice in the listener's space:
//! emitter positions are rotated by the head pose each modulation tick and
//! reduced to per-channel gains with constant-power panning and
//! inverse-distance rolloff.

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// 3-component vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x.mul_add(other.x, self.y.mul_add(other.y, self.z * other.z))
    }

    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y.mul_add(other.z, -(self.z * other.y)),
            self.z.mul_add(other.x, -(self.x * other.z)),
            self.x.mul_add(other.y, -(self.y * other.x)),
        )
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Rotation quaternion (x, y, z vector part, w scalar part)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Quaternion with `omega` as the vector part and unit scalar part.
    /// Used for the listener-velocity head-spin compensation term.
    #[must_use]
    pub const fn from_omega(omega: Vec3) -> Self {
        Self {
            x: omega.x,
            y: omega.y,
            z: omega.z,
            w: 1.0,
        }
    }

    #[must_use]
    pub const fn conjugate(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
            w: self.w,
        }
    }

    /// Rotate `v` by this quaternion (sandwich product, assumes unit length
    /// for pure rotations).
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }
}

/// Sound source state fed to the spatializer each tick
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioEmitter {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Listener (head) state
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioListener {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Left/right gains for a mono source placed relative to the listener.
///
/// Constant-power panning from the lateral direction component, scaled by
/// inverse-distance rolloff. A source at the listener's position pans center.
#[must_use]
pub fn stereo_gains(listener: &AudioListener, emitter: &AudioEmitter) -> [f32; 2] {
    let offset = emitter.position - listener.position;
    let distance = offset.length();
    let attenuation = 1.0 / (1.0 + distance);

    if distance < 1e-6 {
        let center = attenuation * std::f32::consts::FRAC_1_SQRT_2;
        return [center, center];
    }

    // -1 hard left .. +1 hard right
    let pan = (offset.x / distance).clamp(-1.0, 1.0);
    let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
    [attenuation * angle.cos(), attenuation * angle.sin()]
}
