//! Basic math utility

use std::ops::{Add, BitXor, Div, Mul, Neg, Rem, Sub};

pub mod numeric_traits {
    pub trait Sqrt {
        fn sqrt(self) -> Self;
    }

    impl Sqrt for f32 {
        fn sqrt(self) -> Self {
            self.sqrt()
        }
    }
}

macro_rules! operator_on_variadic {
    ($operator: tt, $first: expr) => {
        $first
    };

    ($operator: tt, $first: expr, $($rest: expr),*) => {
        $first $operator operator_on_variadic!($operator, $($rest),*)
    };
}

macro_rules! impl_vecn_binary_operator {
    ($op_name: ident, $op_fn_name: ident, $struct_name: ident, $($x: ident),*) => {
        impl<A: $op_name<Output = A>> $op_name<$struct_name<A>> for $struct_name<A> {
            type Output = $struct_name<A>;

            fn $op_fn_name(self, rhs: $struct_name<A>) -> Self::Output {
                Self::Output {
                    $( $x: $op_name::$op_fn_name(self.$x, rhs.$x), )*
                }
            }
        }

        impl<T: Clone + $op_name<Output = T>> $op_name<T> for $struct_name<T> {
            type Output = $struct_name<T>;

            fn $op_fn_name(self, rhs: T) -> Self::Output {
                Self::Output {
                    $( $x: $op_name::$op_fn_name(self.$x, rhs.clone()), )*
                }
            }
        }
    }
}

macro_rules! impl_vecn {
    ($struct_name: ident, $($x: ident),*) => {
        #[repr(C)]
        #[derive(Debug, Default, PartialEq)]
        pub struct $struct_name<T> {
            $( pub $x : T, )*
        }

        impl<T: Clone> Clone for $struct_name<T> {
            fn clone(&self) -> Self {
                Self {
                    $( $x: self.$x.clone() ),*
                }
            }
        }

        impl<T: Copy> Copy for $struct_name<T> {}

        impl<T> $struct_name<T> {
            pub const fn new($($x: T,)*) -> Self {
                Self { $($x,)* }
            }
        }

        impl<T: Add<T, Output = T> + Mul<T, Output = T>> BitXor for $struct_name<T> {
            type Output = T;

            fn bitxor(self, rhs: $struct_name<T>) -> Self::Output {
                self.dot(rhs)
            }
        }

        impl<T: Add<T, Output = T> + Mul<T, Output = T>> $struct_name<T> {
            pub fn dot(self, rhs: $struct_name<T>) -> T {
                operator_on_variadic!(+, $(self.$x * rhs.$x),*)
            }
        }

        impl<T: Add<T, Output = T> + Mul<T, Output = T> + Clone> $struct_name<T> {
            pub fn length2(&self) -> T {
                self.clone() ^ self.clone()
            }
        }

        impl<T: Add<T, Output = T> + Mul<T, Output = T> + Clone + numeric_traits::Sqrt> $struct_name<T> {
            pub fn length(&self) -> T {
                self.length2().sqrt()
            }
        }

        impl<T: Add<T, Output = T> + Mul<T, Output = T> + Div<T, Output = T> + Clone + numeric_traits::Sqrt> $struct_name<T> {
            pub fn normalized(&self) -> Self {
                let len = self.length();

                Self { $( $x: self.$x.clone() / len.clone() ),* }
            }
        }

        impl<T: Neg<Output = T>> Neg for $struct_name<T> {
            type Output = $struct_name<T>;

            fn neg(self) -> Self::Output {
                Self::Output {
                    $( $x: -self.$x, )*
                }
            }
        }

        impl_vecn_binary_operator!(Add, add, $struct_name, $($x),*);
        impl_vecn_binary_operator!(Sub, sub, $struct_name, $($x),*);
        impl_vecn_binary_operator!(Mul, mul, $struct_name, $($x),*);
        impl_vecn_binary_operator!(Div, div, $struct_name, $($x),*);
    }
}

impl_vecn!(Vec3, x, y, z);

pub type Vec3f = Vec3<f32>;

// Vectors are stored in arena records
unsafe impl bytemuck::Zeroable for Vec3f {}
unsafe impl bytemuck::Pod for Vec3f {}

#[macro_export]
macro_rules! vec3f {
    ($x: expr, $y: expr, $z: expr $(,)?) => {
        $crate::math::Vec3f::new($x, $y, $z)
    };
}

impl<T: Clone + Mul<T, Output = T> + Sub<T, Output = T>> Vec3<T> {
    pub fn cross(self, rhs: Self) -> Vec3<T> {
        Vec3::<T> {
            x: self.y.clone() * rhs.z.clone() - self.z.clone() * rhs.y.clone(),
            y: self.z * rhs.x.clone() - self.x.clone() * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }
}

impl<T: Clone + Mul<T, Output = T> + Sub<T, Output = T>> Rem for Vec3<T> {
    type Output = Self;

    fn rem(self, rhs: Self) -> Self::Output {
        self.cross(rhs)
    }
}

impl Vec3f {
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Normalize vector if it's long enough to do it safely
    pub fn checked_normalized(&self) -> Option<Self> {
        let len2 = self.length2();

        if len2 > f32::EPSILON {
            Some(*self / len2.sqrt())
        } else {
            None
        }
    }

    /// Per-component minimum
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    /// Per-component maximum
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }
}

/// 4x4 matrix. Row-vector convention: points are transformed as `v * M`,
/// so translation lives in the last row.
#[repr(C)]
#[derive(Debug, PartialEq)]
pub struct Mat4<T> {
    pub data: [[T; 4]; 4],
}

pub type Mat4f = Mat4<f32>;

impl<T: Clone> Clone for Mat4<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}

impl<T: Copy> Copy for Mat4<T> {}

// Transforms are copied into BSP face records
unsafe impl bytemuck::Zeroable for Mat4f {}
unsafe impl bytemuck::Pod for Mat4f {}

impl Default for Mat4f {
    fn default() -> Self {
        Self::identity()
    }
}

/// `a * b` applies `a` first, then `b`
impl Mul<Mat4<f32>> for Mat4<f32> {
    type Output = Mat4<f32>;

    fn mul(self, rhs: Mat4<f32>) -> Self::Output {
        let mut data = [[0.0f32; 4]; 4];

        for (row, dst) in data.iter_mut().enumerate() {
            for (col, value) in dst.iter_mut().enumerate() {
                *value = (0..4)
                    .map(|k| self.data[row][k] * rhs.data[k][col])
                    .sum();
            }
        }

        Self { data }
    }
}

impl Mat4<f32> {
    /// Identity matrix getting function
    /// * Returns identity matrix
    pub const fn identity() -> Self {
        Self {
            data: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    } // fn identity

    /// Rotation matrix getting function
    /// * `angle` - angle to create rotation matrix on
    /// * Returns rotation matrix
    pub fn rotate_x(angle: f32) -> Self {
        let sin = angle.sin();
        let cos = angle.cos();

        Self {
            data: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, cos, sin, 0.0],
                [0.0, -sin, cos, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    } // fn rotate_x

    /// Rotation matrix getting function
    /// * `angle` - angle to create rotation matrix on
    /// * Returns rotation matrix
    pub fn rotate_z(angle: f32) -> Self {
        let sin = angle.sin();
        let cos = angle.cos();

        Self {
            data: [
                [cos, sin, 0.0, 0.0],
                [-sin, cos, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    } // fn rotate_z

    /// Translating function.
    /// * `t` - translate vector
    /// * Returns translation matrix
    pub fn translate(t: Vec3f) -> Self {
        Self {
            data: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [t.x, t.y, t.z, 1.0],
            ],
        }
    } // fn translate

    /// Translation part of affine transform
    pub fn translation(&self) -> Vec3f {
        Vec3f::new(self.data[3][0], self.data[3][1], self.data[3][2])
    }

    pub fn transform_vector(&self, v: Vec3f) -> Vec3f {
        Vec3f {
            x: v.x * self.data[0][0] + v.y * self.data[1][0] + v.z * self.data[2][0],
            y: v.x * self.data[0][1] + v.y * self.data[1][1] + v.z * self.data[2][1],
            z: v.x * self.data[0][2] + v.y * self.data[1][2] + v.z * self.data[2][2],
        }
    } // fn transform_vector

    pub fn transform_point(&self, v: Vec3f) -> Vec3f {
        self.transform_vector(v) + self.translation()
    } // fn transform_point
} // impl Mat4<f32>
