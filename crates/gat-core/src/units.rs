//! Newtype wrappers for the physical quantities carried by the network model.
//!
//! The engine itself works in per-unit on the system MVA base. These types keep the
//! boundary honest: a `Megawatts` can only enter the optimization model through
//! [`Megawatts::to_per_unit`], and results come back through `from_per_unit`.
//!
//! ```
//! use gat_core::units::{Degrees, Megawatts};
//!
//! let p = Megawatts(150.0);
//! assert_eq!(p.to_per_unit(100.0), 1.5);
//! assert_eq!(Megawatts::from_per_unit(0.25, 100.0), Megawatts(25.0));
//!
//! let angle = Degrees(180.0).to_radians();
//! assert!((angle.value() - std::f64::consts::PI).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

macro_rules! quantity {
    ($(#[$meta:meta])* $name:ident, $symbol:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub f64);

        impl $name {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = Self;
            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|q| q.0).sum())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:.4} {}", self.0, $symbol)
            }
        }
    };
}

quantity!(
    /// Active power (MW).
    Megawatts,
    "MW"
);
quantity!(
    /// Reactive power (Mvar).
    Megavars,
    "Mvar"
);
quantity!(
    /// Apparent power (MVA). Branch thermal ratings use this unit.
    MegavoltAmperes,
    "MVA"
);
quantity!(
    /// Dimensionless per-unit value on the relevant base.
    PerUnit,
    "pu"
);
quantity!(
    /// Nominal voltage (kV).
    Kilovolts,
    "kV"
);
quantity!(
    /// Angle in radians.
    Radians,
    "rad"
);
quantity!(
    /// Angle in degrees.
    Degrees,
    "deg"
);

macro_rules! per_unit_power {
    ($name:ident) => {
        impl $name {
            /// Express on an MVA base.
            #[inline]
            pub fn to_per_unit(self, base_mva: f64) -> f64 {
                self.0 / base_mva
            }

            #[inline]
            pub fn from_per_unit(value: f64, base_mva: f64) -> Self {
                Self(value * base_mva)
            }
        }
    };
}

per_unit_power!(Megawatts);
per_unit_power!(Megavars);
per_unit_power!(MegavoltAmperes);

impl Radians {
    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0.to_degrees())
    }
}

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }
}

impl Megawatts {
    /// Apparent power for a given reactive component.
    pub fn with_reactive(self, q: Megavars) -> MegavoltAmperes {
        MegavoltAmperes(self.0.hypot(q.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_unit_conversion() {
        let base = 100.0;
        assert_eq!(Megawatts(80.0).to_per_unit(base), 0.8);
        assert_eq!(Megavars::from_per_unit(-0.3, base), Megavars(-30.0));
        assert_eq!(MegavoltAmperes(250.0).to_per_unit(base), 2.5);
    }

    #[test]
    fn test_angle_conversion_roundtrip() {
        let deg = Degrees(-30.0);
        let back = deg.to_radians().to_degrees();
        assert!((back.value() - deg.value()).abs() < 1e-12);
    }

    #[test]
    fn test_sum_and_display() {
        let total: Megawatts = [Megawatts(10.0), Megawatts(5.5)].into_iter().sum();
        assert_eq!(total, Megawatts(15.5));
        assert_eq!(format!("{}", total), "15.5000 MW");
        assert_eq!(Megawatts(3.0).with_reactive(Megavars(4.0)), MegavoltAmperes(5.0));
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&Megawatts(42.0)).unwrap();
        assert_eq!(json, "42.0");
    }
}
