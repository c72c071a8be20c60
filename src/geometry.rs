//! Geometric utility objects.

use crate::num::BFloat;
use std::{
    fmt,
    ops::{Add, Div, Index, IndexMut, Mul, Neg, Sub},
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "for-testing")]
use approx::{AbsDiffEq, RelativeEq};

/// Denotes the x-, y- or z-dimension.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Dim3 {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Dim3 {
    /// Creates an array for iterating over the x-, y- and z-dimensions.
    pub fn slice() -> [Self; 3] {
        [Self::X, Self::Y, Self::Z]
    }
}

use Dim3::{X, Y, Z};

/// Represents any quantity with three dimensional components.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct In3D<T>([T; 3]);

impl<T> In3D<T> {
    /// Creates a new 3D quantity given the three components.
    pub fn new(x: T, y: T, z: T) -> Self {
        Self([x, y, z])
    }

    /// Creates a new 3D quantity by evaluating the given component
    /// constructor for each dimension.
    pub fn with_each_component<C>(create_component: C) -> Self
    where
        C: Fn(Dim3) -> T,
    {
        Self::new(
            create_component(X),
            create_component(Y),
            create_component(Z),
        )
    }
}

impl<T> Index<Dim3> for In3D<T> {
    type Output = T;
    fn index(&self, dim: Dim3) -> &Self::Output {
        &self.0[dim as usize]
    }
}

impl<T> IndexMut<Dim3> for In3D<T> {
    fn index_mut(&mut self, dim: Dim3) -> &mut Self::Output {
        &mut self.0[dim as usize]
    }
}

impl<T: fmt::Display> fmt::Display for In3D<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        fmt::Display::fmt(&self[X], f)?;
        f.write_str(", ")?;
        fmt::Display::fmt(&self[Y], f)?;
        f.write_str(", ")?;
        fmt::Display::fmt(&self[Z], f)?;
        f.write_str("]")
    }
}

#[cfg(feature = "for-testing")]
impl<T> AbsDiffEq for In3D<T>
where
    T: AbsDiffEq,
    T::Epsilon: Copy,
{
    type Epsilon = <T as AbsDiffEq>::Epsilon;

    fn default_epsilon() -> Self::Epsilon {
        T::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        T::abs_diff_eq(&self[X], &other[X], epsilon)
            && T::abs_diff_eq(&self[Y], &other[Y], epsilon)
            && T::abs_diff_eq(&self[Z], &other[Z], epsilon)
    }
}

#[cfg(feature = "for-testing")]
impl<T> RelativeEq for In3D<T>
where
    T: RelativeEq,
    T::Epsilon: Copy,
{
    fn default_max_relative() -> Self::Epsilon {
        T::default_max_relative()
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        T::relative_eq(&self[X], &other[X], epsilon, max_relative)
            && T::relative_eq(&self[Y], &other[Y], epsilon, max_relative)
            && T::relative_eq(&self[Z], &other[Z], epsilon, max_relative)
    }
}

#[cfg(feature = "for-testing")]
macro_rules! impl_approx_eq_3d {
    ($T:ident <$F:ident>) => {
        impl<$F> AbsDiffEq for $T<$F>
        where
            $F: BFloat + AbsDiffEq,
            $F::Epsilon: Copy,
        {
            type Epsilon = <In3D<$F> as AbsDiffEq>::Epsilon;

            fn default_epsilon() -> Self::Epsilon {
                In3D::<$F>::default_epsilon()
            }

            fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
                In3D::<$F>::abs_diff_eq(&self.0, &other.0, epsilon)
            }
        }

        impl<$F> RelativeEq for $T<$F>
        where
            $F: BFloat + RelativeEq,
            $F::Epsilon: Copy,
        {
            fn default_max_relative() -> Self::Epsilon {
                In3D::<$F>::default_max_relative()
            }

            fn relative_eq(
                &self,
                other: &Self,
                epsilon: Self::Epsilon,
                max_relative: Self::Epsilon,
            ) -> bool {
                In3D::<$F>::relative_eq(&self.0, &other.0, epsilon, max_relative)
            }
        }
    };
}

/// A 3D vector.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Vec3<F>(In3D<F>);

impl<F: BFloat> Vec3<F> {
    /// Creates a new 3D vector given the three components.
    pub fn new(x: F, y: F, z: F) -> Self {
        Self(In3D::new(x, y, z))
    }

    /// Creates a new 3D vector by evaluating the given component
    /// constructor for each dimension.
    pub fn with_each_component<C>(create_component: C) -> Self
    where
        C: Fn(Dim3) -> F,
    {
        Self(In3D::with_each_component(create_component))
    }

    /// Creates a new zero vector.
    pub fn zero() -> Self {
        Self::new(F::zero(), F::zero(), F::zero())
    }

    /// Creates the Cartesian vector corresponding to the given spherical components
    /// (radial, polar and azimuthal) at the given polar and azimuthal angles.
    pub fn from_spherical_components(r_comp: F, theta_comp: F, phi_comp: F, theta: F, phi: F) -> Self {
        let (sin_theta, cos_theta) = theta.sin_cos();
        let (sin_phi, cos_phi) = phi.sin_cos();
        Self::new(
            r_comp * sin_theta * cos_phi + theta_comp * cos_theta * cos_phi - phi_comp * sin_phi,
            r_comp * sin_theta * sin_phi + theta_comp * cos_theta * sin_phi + phi_comp * cos_phi,
            r_comp * cos_theta - theta_comp * sin_theta,
        )
    }

    /// Constructs a new point from the vector components.
    pub fn to_point3(&self) -> Point3<F> {
        Point3::with_each_component(|dim| self[dim])
    }

    /// Computes the squared length of the vector.
    pub fn squared_length(&self) -> F {
        self[X] * self[X] + self[Y] * self[Y] + self[Z] * self[Z]
    }

    /// Computes the length of the vector.
    pub fn length(&self) -> F {
        self.squared_length().sqrt()
    }

    /// Whether the vector is the zero vector.
    pub fn is_zero(&self) -> bool {
        self[X] == F::zero() && self[Y] == F::zero() && self[Z] == F::zero()
    }

    /// Whether all components are finite.
    pub fn is_finite(&self) -> bool {
        self[X].is_finite() && self[Y].is_finite() && self[Z].is_finite()
    }

    /// Computes the dot product of the vector with another vector.
    pub fn dot(&self, other: &Self) -> F {
        self[X] * other[X] + self[Y] * other[Y] + self[Z] * other[Z]
    }

    /// Computes the component of the vector along the radial direction
    /// at the given position.
    ///
    /// # Panics
    ///
    /// If the position is the origin.
    pub fn radial_component_at(&self, position: &Point3<F>) -> F {
        let radius = position.radius();
        assert!(radius != F::zero(), "Radial direction undefined at origin.");
        self.dot(&position.to_vec3()) / radius
    }

    /// Normalizes the vector to have unit length.
    pub fn normalize(&mut self) {
        let length = self.length();
        assert!(length != F::zero());
        let inv_length = length.recip();
        self[X] = self[X] * inv_length;
        self[Y] = self[Y] * inv_length;
        self[Z] = self[Z] * inv_length;
    }

    /// Reverses the direction of the vector.
    pub fn reverse(&mut self) {
        self[X] = -self[X];
        self[Y] = -self[Y];
        self[Z] = -self[Z];
    }

    /// Constructs a new vector from the absolute values of the vector components.
    pub fn abs(&self) -> Self {
        Self::new(self[X].abs(), self[Y].abs(), self[Z].abs())
    }

    /// Constructs a new vector by taking the component-wise max with the given vector.
    pub fn max_with(&self, other: &Self) -> Self {
        Self::new(
            F::max(self[X], other[X]),
            F::max(self[Y], other[Y]),
            F::max(self[Z], other[Z]),
        )
    }
}

impl<F: BFloat> Index<Dim3> for Vec3<F> {
    type Output = F;
    fn index(&self, dim: Dim3) -> &Self::Output {
        &self.0[dim]
    }
}

impl<F: BFloat> IndexMut<Dim3> for Vec3<F> {
    fn index_mut(&mut self, dim: Dim3) -> &mut Self::Output {
        &mut self.0[dim]
    }
}

impl<'a, F: BFloat> Add<&'a Vec3<F>> for &'a Vec3<F> {
    type Output = Vec3<F>;
    fn add(self, other: Self) -> Self::Output {
        Self::Output::new(self[X] + other[X], self[Y] + other[Y], self[Z] + other[Z])
    }
}

impl<F: BFloat> Add<Vec3<F>> for &Vec3<F> {
    type Output = Vec3<F>;
    fn add(self, other: Vec3<F>) -> Self::Output {
        self + &other
    }
}

impl<F: BFloat> Add<Vec3<F>> for Vec3<F> {
    type Output = Self;
    fn add(self, other: Self) -> Self::Output {
        &self + &other
    }
}

impl<F: BFloat> Add<&Vec3<F>> for Vec3<F> {
    type Output = Self;
    fn add(self, other: &Self) -> Self::Output {
        &self + other
    }
}

impl<'a, F: BFloat> Sub<&'a Vec3<F>> for &'a Vec3<F> {
    type Output = Vec3<F>;
    fn sub(self, other: Self) -> Self::Output {
        Self::Output::new(self[X] - other[X], self[Y] - other[Y], self[Z] - other[Z])
    }
}

impl<F: BFloat> Sub<Vec3<F>> for &Vec3<F> {
    type Output = Vec3<F>;
    fn sub(self, other: Vec3<F>) -> Self::Output {
        self - &other
    }
}

impl<F: BFloat> Sub<Vec3<F>> for Vec3<F> {
    type Output = Self;
    fn sub(self, other: Self) -> Self::Output {
        &self - &other
    }
}

impl<F: BFloat> Sub<&Vec3<F>> for Vec3<F> {
    type Output = Self;
    fn sub(self, other: &Self) -> Self::Output {
        &self - other
    }
}

impl<F: BFloat> Mul<F> for &Vec3<F> {
    type Output = Vec3<F>;
    fn mul(self, factor: F) -> Self::Output {
        Self::Output::new(factor * self[X], factor * self[Y], factor * self[Z])
    }
}

impl<F: BFloat> Mul<F> for Vec3<F> {
    type Output = Self;
    fn mul(self, factor: F) -> Self::Output {
        &self * factor
    }
}

impl<F: BFloat> Div<F> for &Vec3<F> {
    type Output = Vec3<F>;
    fn div(self, divisor: F) -> Self::Output {
        #![allow(clippy::suspicious_arithmetic_impl)]
        let factor = divisor.recip();
        self * factor
    }
}

impl<F: BFloat> Div<F> for Vec3<F> {
    type Output = Self;
    fn div(self, divisor: F) -> Self::Output {
        &self / divisor
    }
}

impl<F: BFloat> Neg for Vec3<F> {
    type Output = Self;
    fn neg(mut self) -> Self::Output {
        self.reverse();
        self
    }
}

impl<F: BFloat + fmt::Display> fmt::Display for Vec3<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        fmt::Display::fmt(&self[X], f)?;
        f.write_str(", ")?;
        fmt::Display::fmt(&self[Y], f)?;
        f.write_str(", ")?;
        fmt::Display::fmt(&self[Z], f)?;
        f.write_str(")")
    }
}

#[cfg(feature = "for-testing")]
impl_approx_eq_3d!(Vec3<F>);

/// A 3D spatial coordinate.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Point3<F>(In3D<F>);

impl<F: BFloat> Point3<F> {
    /// Creates a new 3D point given the three components.
    pub fn new(x: F, y: F, z: F) -> Self {
        Self(In3D::new(x, y, z))
    }

    /// Creates a new 3D point by evaluating the given component
    /// constructor for each dimension.
    pub fn with_each_component<C>(create_component: C) -> Self
    where
        C: Fn(Dim3) -> F,
    {
        Self(In3D::with_each_component(create_component))
    }

    /// Creates a new 3D point with all components set to zero.
    pub fn origin() -> Self {
        Self::new(F::zero(), F::zero(), F::zero())
    }

    /// Creates a new point from the given spherical coordinates, with `theta`
    /// the polar angle measured from the z-axis and `phi` the azimuthal angle.
    pub fn from_spherical(r: F, theta: F, phi: F) -> Self {
        let (sin_theta, cos_theta) = theta.sin_cos();
        let (sin_phi, cos_phi) = phi.sin_cos();
        Self::new(
            r * sin_theta * cos_phi,
            r * sin_theta * sin_phi,
            r * cos_theta,
        )
    }

    /// Computes the spherical coordinates `(r, theta, phi)` of the point,
    /// with `phi` in the range [0, 2*pi).
    pub fn to_spherical(&self) -> (F, F, F) {
        let r = self.radius();
        let theta = if r == F::zero() {
            F::zero()
        } else {
            (self[Z] / r).max(-F::one()).min(F::one()).acos()
        };
        let mut phi = self[Y].atan2(self[X]);
        if phi < F::zero() {
            phi = phi + F::from(std::f64::consts::TAU).expect("Conversion failed");
        }
        (r, theta, phi)
    }

    /// Computes the distance of the point from the origin.
    pub fn radius(&self) -> F {
        self.to_vec3().length()
    }

    /// Returns a copy of the point moved radially to the given distance from the origin.
    ///
    /// # Panics
    ///
    /// If the point is the origin.
    pub fn with_radius(&self, radius: F) -> Self {
        let current_radius = self.radius();
        assert!(
            current_radius != F::zero(),
            "Cannot rescale the origin to a non-zero radius."
        );
        let scale = radius / current_radius;
        Self::new(self[X] * scale, self[Y] * scale, self[Z] * scale)
    }

    /// Whether all components are finite.
    pub fn is_finite(&self) -> bool {
        self[X].is_finite() && self[Y].is_finite() && self[Z].is_finite()
    }

    /// Computes the distance to the given point.
    pub fn distance_to(&self, other: &Self) -> F {
        (self - other).length()
    }

    /// Constructs a new vector from the point components.
    pub fn to_vec3(&self) -> Vec3<F> {
        Vec3::with_each_component(|dim| self[dim])
    }
}

impl<F: BFloat> Index<Dim3> for Point3<F> {
    type Output = F;
    fn index(&self, dim: Dim3) -> &Self::Output {
        &self.0[dim]
    }
}

impl<F: BFloat> IndexMut<Dim3> for Point3<F> {
    fn index_mut(&mut self, dim: Dim3) -> &mut Self::Output {
        &mut self.0[dim]
    }
}

impl<'a, F: BFloat> Sub<&'a Point3<F>> for &'a Point3<F> {
    type Output = Vec3<F>;
    fn sub(self, other: Self) -> Self::Output {
        Self::Output::new(self[X] - other[X], self[Y] - other[Y], self[Z] - other[Z])
    }
}

impl<F: BFloat> Sub<Point3<F>> for Point3<F> {
    type Output = Vec3<F>;
    fn sub(self, other: Self) -> Self::Output {
        &self - &other
    }
}

impl<'a, F: BFloat> Add<&'a Vec3<F>> for &'a Point3<F> {
    type Output = Point3<F>;
    fn add(self, vector: &Vec3<F>) -> Self::Output {
        Self::Output::new(
            self[X] + vector[X],
            self[Y] + vector[Y],
            self[Z] + vector[Z],
        )
    }
}

impl<F: BFloat> Add<Vec3<F>> for Point3<F> {
    type Output = Self;
    fn add(self, vector: Vec3<F>) -> Self::Output {
        &self + &vector
    }
}

impl<F: BFloat> Add<Vec3<F>> for &Point3<F> {
    type Output = Point3<F>;
    fn add(self, vector: Vec3<F>) -> Self::Output {
        self + &vector
    }
}

impl<F: BFloat> Add<&Vec3<F>> for Point3<F> {
    type Output = Self;
    fn add(self, vector: &Vec3<F>) -> Self::Output {
        &self + vector
    }
}

impl<F: BFloat + fmt::Display> fmt::Display for Point3<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(feature = "for-testing")]
impl_approx_eq_3d!(Point3<F>);
